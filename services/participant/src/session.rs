//! Per-connection session loop: one instruction in, one reply out, until the
//! coordinator disconnects or a fatal error surfaces.

use anyhow::{Context, Result};
use tracing::{info, warn};

use fedmaint_core::round::RoundHandler;

use crate::connection::Channel;
use crate::protocol::{RoundInstruction, RoundReply};

/// Serves rounds until the coordinator sends `Disconnect` or drops the
/// stream. Fatal handler errors are reported upstream before bailing.
pub async fn serve<H: RoundHandler>(channel: &mut Channel, handler: &mut H) -> Result<()> {
    loop {
        let instruction = match channel.recv().await.context("reading instruction")? {
            Some(instruction) => instruction,
            None => {
                info!("coordinator dropped the stream");
                return Ok(());
            }
        };

        match instruction {
            RoundInstruction::Hello { coordinator } => {
                warn!(coordinator, "unexpected mid-session hello, ignoring");
            }
            RoundInstruction::Disconnect => {
                info!("coordinator requested disconnect");
                return Ok(());
            }
            RoundInstruction::GetParameters { config } => {
                match handler.get_parameters(&config) {
                    Ok(parameters) => {
                        channel.send(&RoundReply::Parameters { parameters }).await?;
                    }
                    Err(e) => return fail(channel, e).await,
                }
            }
            RoundInstruction::Fit { parameters, config } => {
                match handler.fit(&parameters, &config) {
                    Ok(out) => {
                        channel
                            .send(&RoundReply::FitResult {
                                parameters: out.parameters,
                                num_examples: out.num_examples,
                                loss: out.loss,
                            })
                            .await?;
                    }
                    Err(e) => return fail(channel, e).await,
                }
            }
            RoundInstruction::Evaluate { parameters, config } => {
                match handler.evaluate(&parameters, &config) {
                    Ok(out) => {
                        channel
                            .send(&RoundReply::EvaluateResult {
                                loss: out.loss,
                                num_examples: out.num_examples,
                                accuracy: out.accuracy,
                                f1_score: out.f1_score,
                            })
                            .await?;
                    }
                    Err(e) => return fail(channel, e).await,
                }
            }
        }
    }
}

async fn fail(channel: &mut Channel, err: fedmaint_core::error::ClientError) -> Result<()> {
    let detail = err.to_string();
    // Best effort; the coordinator may already be gone.
    if let Err(send_err) = channel.send(&RoundReply::Error { detail }).await {
        warn!(error = %send_err, "could not report failure to coordinator");
    }
    Err(err.into())
}
