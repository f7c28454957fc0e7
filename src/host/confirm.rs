use std::time::Duration;
use packbytes::ToBytes;
use crate::{
    Error,
    params::{ParamsCell, Ticket},
    };


/// period at which a waiting writer checks whether its value was transferred
const CONFIRM_POLL: Duration = Duration::from_millis(1);

/**
    wait until the value of `ticket` was acknowledged by the module

    fails with [Error::ParamConfirmTimeout] if the engine did not catch up in time. Dropping the future
    cancels the wait, the value stays published.
*/
pub async fn wait_transferred<P: ToBytes + Copy>(cell: &ParamsCell<P>, ticket: Ticket<P>, timeout: Duration) -> Result<(), Error> {
    tokio::time::timeout(timeout, async {
        while !cell.is_transferred(&ticket) {
            tokio::time::sleep(CONFIRM_POLL).await;
        }
    })
    .await
    .map_err(|_| Error::ParamConfirmTimeout)
}

/// publish a new parameter block and wait for the module to acknowledge it
pub async fn confirm<P: ToBytes + Copy>(cell: &ParamsCell<P>, value: P, timeout: Duration) -> Result<(), Error> {
    let ticket = cell.publish(value);
    wait_transferred(cell, ticket, timeout).await
}

/// modify the parameter block in place and wait for the module to acknowledge it
pub async fn confirm_update<P: ToBytes + Copy>(cell: &ParamsCell<P>, change: impl FnOnce(&mut P), timeout: Duration) -> Result<(), Error> {
    let ticket = cell.update(change);
    wait_transferred(cell, ticket, timeout).await
}
