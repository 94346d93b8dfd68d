
mod resource_tests;
mod transport_tests;
