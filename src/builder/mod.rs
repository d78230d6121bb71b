//! Builder API for declaring a machine by name.
//!
//! The runtime API works with handles. The builder lets a host describe a
//! machine with plain names instead and resolves them in one pass.
//!
//! # Example
//!
//! ```
//! use statekit::builder::{MachineBuilder, WILDCARD};
//!
//! let door = MachineBuilder::<()>::new("door")
//!     .states(["Open", "Closed", "Broken"])
//!     .transition("close", &["Open"], "Closed")
//!     .transition("open", &["Closed"], "Open")
//!     .transition("break", &[WILDCARD], "Broken")
//!     .initial("Open")
//!     .build()
//!     .unwrap();
//!
//! door.start().unwrap();
//! assert!(door.invoke("close", None).unwrap().unwrap());
//! assert!(door.state("Closed").unwrap().is_active());
//! ```

pub mod error;
pub mod machine;

pub use error::BuildError;
pub use machine::{Blueprint, MachineBuilder, WILDCARD};
