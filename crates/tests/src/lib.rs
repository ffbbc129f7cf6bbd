//! Relay integration tests. The service graph is assembled exactly as the
//! binary wires it, with the external seams (metadata store, insight
//! store, broker, media log, fraud probe) swapped for the in-memory
//! doubles from `intervue_services::testing`.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod api_tests;
#[cfg(test)]
mod fanout_tests;
#[cfg(test)]
mod ingest_tests;
#[cfg(test)]
mod room_tests;
