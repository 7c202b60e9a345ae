pub mod mock_external_api;
