//! Route table construction and service/operation dispatch

pub mod dispatcher;
pub mod handler;
pub mod table;

pub use dispatcher::{DispatchError, Dispatcher};
pub use handler::{handler_fn, HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
pub use table::{build, BuildError, RouteEntry, RouteSummary, RouteTable, RouteTableBuilder};
