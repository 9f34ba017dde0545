//! Integration tests for invbridge-http
//!
//! Uses wiremock to stand in for fireTMS and Optima and checks request
//! shape, pagination, retry classification and error mapping of the
//! two adapters.

mod common;

mod test_destination;
mod test_source;
