use std::{
    fmt::Display,
    sync::{Mutex, RwLock},
};

use poise::serenity_prelude as serenity;
use timer::{Guard, Timer};
use tokio::runtime::Handle;

use crate::{db, sort};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub(crate) enum Error {
    Db(db::Error),
    R2d2(r2d2::Error),
    /// Repeating every zero (or fewer) minutes would never yield.
    InvalidInterval(chrono::Duration),
}

impl From<db::Error> for Error {
    fn from(e: db::Error) -> Self {
        Error::Db(e)
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Error::R2d2(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Db(e) => write!(f, "Database error: {}", e),
            Error::R2d2(e) => write!(f, "R2D2 error: {}", e),
            Error::InvalidInterval(every) => write!(f, "Invalid sort interval: {}", every),
        }
    }
}

impl std::error::Error for Error {}

/// Runs the global channel sort on a repeating timer.
pub(crate) struct Scheduler<T>
where
    T: AsRef<serenity::Http> + Clone + Send + Sync + 'static,
{
    timer: Mutex<Timer>,
    pool: db::Pool,
    guard: RwLock<Option<Guard>>,
    ctx: T,
}

impl<T: AsRef<serenity::Http> + Clone + Send + Sync + 'static> Scheduler<T> {
    pub(crate) fn new(pool: db::Pool, ctx: T) -> Self {
        Self {
            timer: Mutex::new(Timer::new()),
            pool,
            guard: RwLock::new(None),
            ctx,
        }
    }

    /// Starts sorting every `every`, replacing a previously started schedule.
    pub(crate) fn start(&self, every: chrono::Duration) -> Result<()> {
        if every <= chrono::Duration::zero() {
            return Err(Error::InvalidInterval(every));
        }

        let conn = self.pool.get()?;
        let categories = db::get_sorted_categories(&conn)?;
        log::info!(
            "Sorting {} categories every {} minutes",
            categories.len(),
            every.num_minutes()
        );

        let handle = Handle::current();
        let ctx = self.ctx.clone();
        let pool = self.pool.clone();

        let guard = self
            .timer
            .lock()
            .expect("Unable to lock timer")
            .schedule_repeating(every, move || Self::run(&ctx, &pool, &handle));

        let old_guard = self
            .guard
            .write()
            .expect("Unable to get mut guard")
            .replace(guard);

        drop(old_guard);

        Ok(())
    }

    fn run(ctx: &T, pool: &db::Pool, handle: &Handle) {
        handle.block_on(async {
            log::info!("Running scheduled channel sort");

            match sort::enforce_all(ctx.as_ref(), pool).await {
                Ok(moved) => log::info!("Scheduled sort moved {} channels", moved),
                Err(e) => log::error!("Error running scheduled sort: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn scheduler() -> Scheduler<Arc<serenity::Http>> {
        Scheduler::new(db::memory_pool(), Arc::new(serenity::Http::new("")))
    }

    #[test]
    fn rejects_intervals_that_never_elapse() {
        let scheduler = scheduler();

        assert!(matches!(
            scheduler.start(chrono::Duration::zero()),
            Err(Error::InvalidInterval(_))
        ));
        assert!(matches!(
            scheduler.start(chrono::Duration::minutes(-5)),
            Err(Error::InvalidInterval(_))
        ));
        assert!(scheduler.guard.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn keeps_the_schedule_alive() {
        let scheduler = scheduler();

        scheduler.start(chrono::Duration::minutes(60)).unwrap();
        assert!(scheduler.guard.read().unwrap().is_some());

        // Restarting replaces the previous schedule.
        scheduler.start(chrono::Duration::minutes(30)).unwrap();
        assert!(scheduler.guard.read().unwrap().is_some());
    }
}
