/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The native coin chaincode: a minimal fungible token.
//!
//! The account that deploys the contract becomes its owner and the only account allowed to
//! mint. Balances are signed 64-bit integers keyed by the recipient's public key bytes.

use serde::{Deserialize, Serialize};

use crate::types::base64_bytes;

use super::chaincode::{CallContext, Chaincode, ChaincodeError, QueryContext};

/// The native code id under which the coin is deployable.
pub const CODE_ID: &[u8] = b"coin";

const OWNER_KEY: &[u8] = b"owner";

/// JSON input for invocations and queries.
#[derive(Serialize, Deserialize)]
pub struct Input {
    pub method: String,
    #[serde(with = "base64_bytes", default)]
    pub dest: Vec<u8>,
    #[serde(default)]
    pub value: i64,
}

pub struct Coin;

impl Chaincode for Coin {
    fn init(&self, ctx: &mut dyn CallContext) -> Result<(), ChaincodeError> {
        let owner = ctx.sender().to_vec();
        ctx.set_state(OWNER_KEY, owner);
        Ok(())
    }

    fn invoke(&self, ctx: &mut dyn CallContext) -> Result<(), ChaincodeError> {
        let input: Input = serde_json::from_slice(ctx.input())?;
        match input.method.as_str() {
            "mint" => invoke_mint(ctx, &input),
            "transfer" => invoke_transfer(ctx, &input),
            method => Err(ChaincodeError(format!("unknown method {}", method))),
        }
    }

    fn query(&self, ctx: &dyn QueryContext) -> Result<Vec<u8>, ChaincodeError> {
        let input: Input = serde_json::from_slice(ctx.input())?;
        match input.method.as_str() {
            "balance" => {
                let balance = get_balance(ctx, &input.dest);
                Ok(serde_json::to_vec(&balance)?)
            }
            method => Err(ChaincodeError(format!("unknown method {}", method))),
        }
    }
}

fn invoke_mint(ctx: &mut dyn CallContext, input: &Input) -> Result<(), ChaincodeError> {
    match ctx.get_state(OWNER_KEY) {
        Some(owner) if owner == ctx.sender() => (),
        _ => return Err(ChaincodeError::new("mint not allowed")),
    }
    if input.value <= 0 {
        return Err(ChaincodeError::new("mint value must be positive"));
    }
    let balance = get_balance(ctx, &input.dest);
    set_balance(ctx, &input.dest, balance + input.value);
    Ok(())
}

fn invoke_transfer(ctx: &mut dyn CallContext, input: &Input) -> Result<(), ChaincodeError> {
    if input.value <= 0 {
        return Err(ChaincodeError::new("transfer value must be positive"));
    }
    let sender = ctx.sender().to_vec();
    let from_balance = get_balance(ctx, &sender);
    if from_balance < input.value {
        return Err(ChaincodeError::new("insufficient balance"));
    }
    set_balance(ctx, &sender, from_balance - input.value);
    // Read the destination after the debit so a self-transfer conserves the balance.
    let to_balance = get_balance(ctx, &input.dest);
    set_balance(ctx, &input.dest, to_balance + input.value);
    Ok(())
}

fn get_balance(ctx: &dyn QueryContext, account: &[u8]) -> i64 {
    ctx.get_state(account)
        .and_then(|bytes| bytes.try_into().ok())
        .map(i64::from_be_bytes)
        .unwrap_or(0)
}

fn set_balance(ctx: &mut dyn CallContext, account: &[u8], balance: i64) {
    ctx.set_state(account, balance.to_be_bytes().to_vec());
}
