//! Reference payments API used as the harness subject

pub mod app;
pub mod controllers;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod subject;
pub mod suite;

pub use app::PaymentApp;
pub use error::PaymentError;
pub use subject::PaymentApiSubject;
pub use suite::{payment_dependency, payment_suite};
