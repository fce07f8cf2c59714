//! Strategy selector: pin distance to a concrete credit-spread setup.

pub mod selector;

pub use selector::select_setup;
