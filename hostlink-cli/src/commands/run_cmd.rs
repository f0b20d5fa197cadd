use std::path::PathBuf;

use anyhow::Context;
use hostlink_runtime::{ModuleSource, RuntimeConfig, Session, SessionError};

use crate::report::{format_line, ContextSummary, RunSummary};
use crate::script::EventScript;

pub struct RunArgs {
    pub module: String,
    pub frames: u32,
    pub frame_ms: f64,
    pub events: Option<PathBuf>,
}

pub async fn run(config: RuntimeConfig, args: RunArgs) -> anyhow::Result<()> {
    let script = match &args.events {
        Some(path) => EventScript::load(path)?,
        None => EventScript::default(),
    };

    let mut session = Session::new(config)?;
    session
        .instantiate(ModuleSource::locator(args.module.as_str()))
        .await
        .with_context(|| format!("instantiating {}", args.module))?;

    let summary = pump(&mut session, &script, args.frames, args.frame_ms, |line| {
        println!("{line}")
    })?;
    print!("{summary}");
    session.shutdown();
    Ok(())
}

/// Runs `frames` animation frames, dispatching each scripted event before
/// the frame it is scheduled for, and echoes module console output.
pub fn pump(
    session: &mut Session,
    script: &EventScript,
    frames: u32,
    frame_ms: f64,
    mut echo: impl FnMut(String),
) -> anyhow::Result<RunSummary> {
    let canvas_id = session.config().canvas.id.clone();
    let mut summary = RunSummary {
        frames,
        ..Default::default()
    };
    summary.tasks += keep_going(session.run_until_idle())?.unwrap_or(0);
    flush_console(session, &mut summary, &mut echo);

    for frame in 0..frames {
        for event in script.at_frame(frame) {
            let target = event.target(&canvas_id);
            summary.events_dispatched += 1;
            match session.dispatch_to(target, event.to_record()?) {
                Ok(outcome) => {
                    summary.events_handled += usize::from(outcome.invoked);
                    summary.defaults_prevented += usize::from(outcome.default_prevented);
                }
                Err(SessionError::NoSuchElement(id)) => {
                    log::warn!("frame {frame}: no element `{id}` for {}", event.kind);
                }
                Err(err) => {
                    keep_going::<()>(Err(err))?;
                }
            }
        }

        let time_ms = f64::from(frame + 1) * frame_ms;
        summary.frame_callbacks += keep_going(session.frame(time_ms))?.unwrap_or(0);
        flush_console(session, &mut summary, &mut echo);
    }

    let unreached = script.unreached(frames);
    if unreached > 0 {
        log::warn!("{unreached} scripted events fall after the last frame");
    }

    summary.closures_swept = session.collect_garbage()?;
    if let Some(host) = session.host() {
        summary.live_handles = host.heap.live_count();
        summary.live_closures = host.closures.live();
        summary.console_dropped = host.env.console.dropped();
        summary.contexts = host
            .env
            .contexts()
            .map(|ctx| ContextSummary {
                calls: ctx.call_counts().values().sum(),
                stats: ctx.stats(),
            })
            .collect();
    }
    Ok(summary)
}

/// An uncaught exception fails only the call that raised it; anything else
/// ends the run.
fn keep_going<T>(result: Result<T, SessionError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SessionError::Uncaught(message)) => {
            log::error!("uncaught exception: {message}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn flush_console(session: &mut Session, summary: &mut RunSummary, echo: &mut impl FnMut(String)) {
    let Some(host) = session.host_mut() else {
        return;
    };
    let now = chrono::Local::now();
    for line in host.env.console.drain() {
        echo(format_line(now, &line));
    }
    summary.console_dropped = host.env.console.dropped();
}
