//! Generated protobuf/tonic bindings for the audiofork.v1 package.

tonic::include_proto!("audiofork.v1");
