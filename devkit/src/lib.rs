/*!
# DOCSIS DevKit - test doubles and fixtures

Helpers for exercising `docsis-agent` without a FRITZ!Box or InfluxDB:
- `MockRouter` / `RecordingSink` for the router and sink seams
- payload fixtures for login answers and `docInfo` listings
- axum fakes serving the real HTTP endpoints on localhost
- `TestHarness` wiring an agent to the in-memory doubles
*/

pub mod fake_servers;
pub mod fixtures;
pub mod router_stub;
pub mod sink_stub;
pub mod test_utils;

pub use fake_servers::{FakeFritzBox, FakeInflux, InfluxWrite};
pub use fixtures::{login_xml, sample_doc_info, DocInfoBuilder};
pub use router_stub::{Endpoint, MockRouter, RecordedRequest, Reply, RouterAccount};
pub use sink_stub::RecordingSink;
pub use test_utils::TestHarness;
