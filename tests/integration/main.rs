mod mock_venue;
mod pipeline;
