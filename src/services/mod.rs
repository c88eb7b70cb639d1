//! Domain services behind the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `orchestrator` owns the session and drives the other modules; route
//! handlers only translate between HTTP and orchestrator calls. The
//! suggestion rotator and weather client are independent of the session.

pub mod conversation;
pub mod diagnosis;
pub mod intake;
pub mod orchestrator;
pub mod session;
pub mod speech;
pub mod suggestions;
pub mod weather;
