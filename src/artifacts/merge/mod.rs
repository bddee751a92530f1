pub mod bca_finder;
