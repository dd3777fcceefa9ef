// Market data module entrypoint
pub mod adapters;      // source-specific page fetchers (JSON API, static and dynamic HTML)
pub mod dataset;       // canonical projection + CSV sink
pub mod header;        // header text -> column position
pub mod normaliser;    // raw numbers -> display strings
pub mod orchestrator;  // concurrent page tasks over browser sessions
pub mod pagination;    // sequential paging with rate-limit backoff
pub mod session;       // browser session abstraction
pub mod types;
