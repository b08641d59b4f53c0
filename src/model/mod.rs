//! Vendor-neutral data model consumed by the compilers.

pub mod acl;
pub mod flow;
pub mod header_space;
pub mod ip;
pub mod ip_space;

pub use acl::{AclLine, AclLineMatchExpr, IpAccessList, LineAction};
pub use flow::Flow;
pub use header_space::{HeaderSpace, IpProtocol, SubRange, TcpFlag, TcpFlags, TcpFlagsMatchConditions};
pub use ip::{Ip, IpWildcard, Prefix};
pub use ip_space::{AclIpSpaceLine, IpSpace};
