//! Integration tests for drupebox-dropbox
//!
//! Uses wiremock to simulate the Dropbox API and verifies end-to-end
//! behavior of listings, change feeds, transfers, error mapping and the
//! OAuth2 token endpoint.

mod common;

mod test_auth;
mod test_list;
mod test_transfer;
