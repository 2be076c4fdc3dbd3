use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Unsupported symbol '{0}': expected a 't' (trading) or 'f' (funding) prefix")]
    UnsupportedSymbol(String),
}
