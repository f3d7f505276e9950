//! `dchat`: serverless peer-to-peer terminal chat over an anonymizing
//! transport. See [`engine::Engine`] for the multiplexer that ties
//! every other module together.

pub mod cli;
pub mod command;
pub mod constants;
pub mod contacts;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod identity;
pub mod input;
pub mod output;
pub mod transport;
pub mod wire;
