pub mod support;

mod guard_tests;
mod recovery_tests;
mod store_tests;
