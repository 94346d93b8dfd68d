mod listing_tests;
mod operations_tests;
