#![forbid(unsafe_code)]
//! HTTP server exposing the CampusChain ledger

use campuschain::node::Node;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::init()?;
    node.start().await?;
    Ok(())
}
