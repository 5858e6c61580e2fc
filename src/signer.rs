//! External signing collaborator.
//!
//! Key custody, decryption, and the signing handshake live outside this
//! engine. The engine hands a fully-built transaction to the signer and gets
//! back the broadcast hash; receipts are observed through the provider.

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::TxHash;

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signs and broadcasts `tx` from the wallet identified by `wallet_id`,
    /// returning the transaction hash once accepted by the network.
    async fn sign_and_submit(&self, wallet_id: &str, tx: TypedTransaction) -> Result<TxHash>;
}
