use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {}: {message}", position(.index))]
pub struct ValidationError {
    pub index: Option<usize>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            index: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

fn position(index: &Option<usize>) -> String {
    index.map_or_else(|| "?".to_string(), |i| i.to_string())
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid feed configuration: {0}")]
    Config(String),
}
