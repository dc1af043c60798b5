//! Mock hardware for development and testing.
//!
//! Each mock is created together with a handle that shares its state, so a
//! test can drive the device from outside while the code under test owns it.

mod adapter;
mod reader;

pub use adapter::{AdapterCall, MockAdapter, MockAdapterHandle};
pub use reader::{
    DEFAULT_ATR, FailurePoint, MockCard, MockCardReader, MockReaderDriver, MockReaderHandle,
    ReaderCall, SW_SUCCESS,
};
