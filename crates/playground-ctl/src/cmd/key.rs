//! Print the cache identity of a submission without sending it.

use anyhow::Result;

use playground_core::{CompileRequest, RequestFormat, StoreKey};

pub fn cmd_key(request: &CompileRequest) -> Result<()> {
    let route = request.route(RequestFormat::Raw);
    let store_key = StoreKey::for_request(&route, &request.body(RequestFormat::Raw));

    println!("  route     : POST {}", route);
    println!("  key       : {}", request.cache_key());
    println!("  store key : {}", store_key);
    Ok(())
}
