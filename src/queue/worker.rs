//! Single-consumer worker loop: stale-recovery, parallelism cap, claim,
//! hand-off to the pipeline, periodic compaction. Mirrors spec §4.3's
//! five-step loop exactly; parallelism cap is 1 by default but read from
//! config rather than hardcoded, per the Open Question in spec §9.

use crate::db;
use crate::pipeline;
use crate::state::AppState;

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(state.settings.worker_tick_interval);
    let mut tick_count: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = state.queue_notify.notified() => {}
        }

        tick_count = tick_count.wrapping_add(1);

        recover_stale(&state).await;

        match db::jobs::count_processing(&state.db).await {
            Ok(n) if n as usize >= state.settings.worker_parallelism_cap => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("worker: failed to count processing jobs: {}", e);
                continue;
            }
        }

        match db::jobs::claim_next_pending(&state.db).await {
            Ok(Some(job)) => {
                tracing::info!("worker: claimed job {} (handle={})", job.id, job.target_handle);
                pipeline::run_job(&state, job).await;
            }
            Ok(None) => {}
            Err(e) => tracing::error!("worker: failed to claim next pending job: {}", e),
        }

        if tick_count % state.settings.queue_compaction_interval_ticks == 0 {
            match db::jobs::compact_queue_positions(&state.db).await {
                Ok(n) if n > 0 => tracing::info!("worker: compacted {} queue positions", n),
                Ok(_) => {}
                Err(e) => tracing::error!("worker: queue compaction failed: {}", e),
            }
        }
    }
}

/// Step 1 of the loop: any `processing` row stuck past the stale
/// threshold is failed out with a refund, one transaction per row.
async fn recover_stale(state: &AppState) {
    let stale = match db::jobs::find_stale_processing(&state.db, state.settings.stale_job_timeout).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("worker: stale-recovery query failed: {}", e);
            return;
        }
    };

    for job in stale {
        tracing::warn!("worker: reclaiming stale job {} (started_at={:?})", job.id, job.started_at);
        if let Err(e) = pipeline::fail_and_refund(&state.db, job.id, job.user_id, "Timed out while processing").await {
            tracing::error!("worker: failed to reclaim stale job {}: {}", job.id, e);
        }
    }
}
