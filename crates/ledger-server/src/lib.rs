#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod handler;
pub mod service;

pub use crate::error::{Error, ErrorKind, ErrorResponse, Result};
