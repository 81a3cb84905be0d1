/*!
# PBS DevKit - Test tooling for the PBS exporter

- Mock PBS REST API server (canned responses, recorded requests)
- JSON fixtures for datastore, namespace, snapshot and node endpoints
- Parser and lookups for the Prometheus text format
*/

pub mod pbs_stub;
pub mod fixtures;
pub mod test_utils;

pub use pbs_stub::MockPbs;
pub use fixtures::Fixtures;
pub use test_utils::Exposition;
