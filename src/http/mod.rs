//! HTTP listener subsystem.
//!
//! # Data Flow
//! ```text
//! module factories (initialize, in plan order)
//!     → RouteTable::merge (probe, index and metrics routes)
//! server module start()
//!     → bind TcpListener
//!     → HttpServer::new(routes.take()) (middleware layers)
//! server module run()
//!     → HttpServer::run (graceful shutdown once peers are terminal)
//! ```

pub mod server;

pub use server::{HttpServer, RouteTable};
