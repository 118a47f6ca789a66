use anyhow::Result;

use crate::server::setup_shared_state;
use sift::config::SiftConfig;

/// Route a question through the dispatcher and print the answer.
pub async fn ask(config: SiftConfig, query: &str, session: &str) -> Result<()> {
    let history_limit = config.dispatch.history_limit;
    let state = setup_shared_state(config)?;

    let reply = state
        .dispatcher
        .answer(state.store.db(), session, query, history_limit)
        .await?;

    match (&reply.agent, &reply.reason) {
        (Some(agent), Some(reason)) => {
            println!("[{agent}] confidence {:.1} ({reason})\n", reply.confidence)
        }
        _ => println!("[no agent]\n"),
    }
    println!("{}", reply.response);
    Ok(())
}
