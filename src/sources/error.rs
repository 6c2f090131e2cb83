// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Pipe creation error: {0}")]
    PipeCreate(String),

    #[error("Socket bind error: {0}")]
    SocketBind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
