//! gRPC transport for the metrics Export RPC.

mod grpc;

pub use grpc::GrpcTransport;
