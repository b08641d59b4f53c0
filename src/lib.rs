//! # bdd-acl: symbolic packet filters with Binary Decision Diagrams
//!
//! **`bdd-acl`** turns packet-header predicates and ordered access lists into
//! **Binary Decision Diagrams (BDDs)** over a fixed bit-level encoding of a packet header.
//! Questions like "does any packet match both filters" or "which packet does this line
//! still permit" become canonical-form comparisons and satisfiability queries.
//!
//! ## How it fits together
//!
//! - **[`bdd`]**: the [`Bdd`][crate::bdd::Bdd] manager. All formulas are built through it,
//!   and every formula is a lightweight [`Ref`][crate::reference::Ref] handle.
//! - **[`packet`]**: [`BddPacket`][crate::packet::BddPacket] allocates one block of
//!   variables per header field (addresses, ports, protocol, ICMP, TCP flags, DSCP, ECN,
//!   fragment offset, packet length) and decodes satisfying assignments back into a
//!   [`Flow`][crate::model::Flow].
//! - **[`integer`]**: fixed-width unsigned integers made of formulas, with constants,
//!   comparisons and ranges.
//! - **[`ip_space_to_bdd`]**, **[`header_space_to_bdd`]**, **[`acl_to_bdd`]**: compilers
//!   from the [`model`] types to formulas. Named address sets and named filters are
//!   memoized, and reference cycles are reported as [`Error::CircularReference`].
//! - **[`source`]**: encodes the ingress interface (or the device itself) with as few
//!   variables as the filters need.
//! - **[`flow_preference`]**: picks a "typical" flow out of a set, e.g. an ICMP echo request
//!   when debugging.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::collections::{BTreeSet, HashMap};
//!
//! use bdd_acl::acl_to_bdd::AclToBdd;
//! use bdd_acl::model::{AclLine, AclLineMatchExpr, HeaderSpace, IpAccessList, IpProtocol, SubRange};
//! use bdd_acl::packet::BddPacket;
//! use bdd_acl::source::SourceManager;
//!
//! let packet = BddPacket::new();
//! let sources = SourceManager::for_interfaces(&packet, &BTreeSet::new());
//! let (acls, ip_spaces) = (HashMap::new(), HashMap::new());
//! let compiler = AclToBdd::new(&packet, &acls, &ip_spaces, &sources);
//!
//! let ssh = HeaderSpace::new()
//!     .with_ip_protocols([IpProtocol::TCP])
//!     .with_dst_ports([SubRange::singleton(22)]);
//! let acl = IpAccessList::new(
//!     "no-ssh",
//!     vec![
//!         AclLine::rejecting(AclLineMatchExpr::match_header_space(ssh)),
//!         AclLine::accepting(AclLineMatchExpr::True),
//!     ],
//! );
//!
//! let permitted = compiler.to_bdd(&acl).unwrap();
//! let flow = packet.get_flow(permitted).unwrap();
//! assert!(!(flow.ip_protocol == IpProtocol::TCP && flow.dst_port == 22));
//! ```

pub mod acl_to_bdd;
pub mod bdd;
pub mod cache;
pub mod error;
pub mod fields;
pub mod finite_domain;
pub mod flow_preference;
pub mod header_space_to_bdd;
pub mod integer;
pub mod ip_space_to_bdd;
pub mod match_to_bdd;
pub mod memo;
pub mod model;
pub mod node;
pub mod packet;
pub mod pairing;
pub mod prefix;
pub mod reference;
pub mod sat;
pub mod source;
pub mod table;

pub use error::{Error, Result};
