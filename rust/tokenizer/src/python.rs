use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::path::Path;

use crate::error::TokenizerError;
use crate::tokenizer::{Tokenizer, TokenizerConfig};

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python wrapper for the Fidel BPE tokenizer
#[pyclass(name = "AmharicTokenizer", module = "amharic_tokenizer_rs")]
pub struct PyTokenizer {
    pub(crate) inner: Tokenizer,
}

#[pymethods]
impl PyTokenizer {
    #[new]
    #[pyo3(signature = (num_merges=50_000, max_vocab_size=Some(10_000)))]
    pub fn new(num_merges: usize, max_vocab_size: Option<usize>) -> PyResult<Self> {
        let inner = Tokenizer::new(TokenizerConfig {
            num_merges,
            max_vocab_size,
        })
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Learn merges from a block of text; returns the number learned
    pub fn train(&mut self, py: Python<'_>, corpus: &str) -> usize {
        py.allow_threads(|| self.inner.train(corpus))
    }

    /// Learn merges from the concatenation of several files
    pub fn train_from_files(&mut self, py: Python<'_>, files: Vec<String>) -> PyResult<usize> {
        py.allow_threads(|| {
            let paths: Vec<&Path> = files.iter().map(Path::new).collect();
            self.inner.train_from_files(&paths)
        })
        .map_err(to_py_err)
    }

    pub fn tokenize(&self, py: Python<'_>, text: &str) -> Vec<String> {
        py.allow_threads(|| self.inner.tokenize(text))
    }

    pub fn encode(&self, py: Python<'_>, text: &str) -> Vec<u32> {
        py.allow_threads(|| self.inner.encode(text))
    }

    pub fn decode(&self, ids: Vec<u32>) -> String {
        self.inner.decode(&ids)
    }

    pub fn detokenize(&self, tokens: Vec<String>) -> String {
        self.inner.detokenize(&tokens)
    }

    /// Save to a JSON file; returns the path written
    pub fn save(&self, path: &str) -> PyResult<String> {
        let written = self.inner.save(Path::new(path)).map_err(to_py_err)?;
        Ok(written.to_string_lossy().into_owned())
    }

    /// Load a tokenizer saved with `save`
    #[staticmethod]
    pub fn load(path: &str) -> PyResult<Self> {
        let inner = Tokenizer::load(Path::new(path)).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id).map(str::to_string)
    }

    #[getter]
    pub fn merge_count(&self) -> usize {
        self.inner.merge_count()
    }

    pub fn __len__(&self) -> usize {
        self.inner.vocab_size()
    }

    pub fn __repr__(&self) -> String {
        format!(
            "AmharicTokenizer(vocab_size={}, merges={})",
            self.inner.vocab_size(),
            self.inner.merge_count()
        )
    }
}
