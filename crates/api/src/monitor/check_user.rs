use super::render::render_notification;
use crate::shared::stop_signal::StopSignal;
use crate::shared::usecase::UseCase;
use classwatch_domain::{
    matching_instances, LedgerEntry, NameDirectory, NotificationObligation, Predicate, TimeSpan,
    User, UserFilter, ID,
};
use classwatch_infra::{
    AuthError, ClasswatchContext, DeliveryError, DeliveryReceipt, FetchError,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// One user's slice of a poll cycle: open a session, fetch a snapshot, match
/// it against the user's filters, gate the matches through the ledger, then
/// dispatch and commit obligation by obligation. Failures never escape the
/// slice; other users' slices are unaffected.
#[derive(Debug)]
pub struct CheckUserUseCase {
    pub user: User,
    pub window: TimeSpan,
    pub names: NameDirectory,
    pub stop: StopSignal,
}

/// Why a slice stopped before completing its dispatch loop
#[derive(Debug, Clone, PartialEq)]
pub enum SliceOutcome {
    Completed,
    /// Session could not be opened or expired mid-fetch; surfaced for
    /// re-authentication and retried next cycle
    AbortedAuth,
    /// Snapshot fetch failed; retried next cycle with no ledger effects
    AbortedFetch,
    /// The stop signal fired between units of work
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct UserCheckReport {
    pub user_id: ID,
    pub outcome: SliceOutcome,
    /// Distinct instances matching at least one filter
    pub matched: usize,
    /// Matches the ledger had no entry for, i.e. notifications owed
    pub obligations: usize,
    pub dispatched: usize,
    pub rejected: usize,
    /// Obligations left owed for the next cycle (transient delivery or
    /// ledger trouble)
    pub deferred: usize,
}

impl UserCheckReport {
    fn new(user_id: ID) -> Self {
        Self {
            user_id,
            outcome: SliceOutcome::Completed,
            matched: 0,
            obligations: 0,
            dispatched: 0,
            rejected: 0,
            deferred: 0,
        }
    }
}

#[derive(Debug)]
pub enum UseCaseError {}

#[async_trait::async_trait(?Send)]
impl UseCase for CheckUserUseCase {
    type Response = UserCheckReport;

    type Error = UseCaseError;

    const NAME: &'static str = "CheckUser";

    async fn execute(&mut self, ctx: &ClasswatchContext) -> Result<Self::Response, Self::Error> {
        let mut report = UserCheckReport::new(self.user.id.clone());
        if self.stop.is_cancelled() {
            report.outcome = SliceOutcome::Cancelled;
            return Ok(report);
        }

        // Filters are read exactly once; an edit made while the cycle runs
        // takes effect next cycle
        let mut filters = ctx.repos.filters.find_by_user(&self.user.id).await;
        if filters.is_empty() {
            debug!("User {} has no filters, nothing to match", self.user.id);
            return Ok(report);
        }
        filters.sort_by(|a, b| a.id.cmp(&b.id));

        let session = match ctx.providers.upstream.get_session(&self.user).await {
            Ok(session) => session,
            Err(AuthError::Transient(e)) => {
                warn!("Could not open session for user {}: {}", self.user.id, e);
                report.outcome = SliceOutcome::AbortedFetch;
                return Ok(report);
            }
            Err(e) => {
                warn!(
                    "Authentication failed for user {}, surfacing for re-authentication: {}",
                    self.user.id, e
                );
                report.outcome = SliceOutcome::AbortedAuth;
                return Ok(report);
            }
        };

        let clubs = clubs_to_fetch(&filters, &self.names);
        if clubs.is_empty() {
            warn!(
                "No clubs resolvable for user {} (club-unrestricted filters need a refreshed catalog), skipping slice",
                self.user.id
            );
            return Ok(report);
        }

        let instances = match ctx
            .providers
            .upstream
            .fetch_classes(&session, &clubs, &self.window)
            .await
        {
            Ok(instances) => instances,
            Err(FetchError::AuthExpired) => {
                warn!(
                    "Session expired mid-fetch for user {}, surfacing for re-authentication",
                    self.user.id
                );
                report.outcome = SliceOutcome::AbortedAuth;
                return Ok(report);
            }
            Err(FetchError::Transient(e)) => {
                warn!(
                    "Snapshot fetch failed for user {}, retrying next cycle: {}",
                    self.user.id, e
                );
                report.outcome = SliceOutcome::AbortedFetch;
                return Ok(report);
            }
        };
        debug!(
            "Fetched {} instances across {} clubs for user {}",
            instances.len(),
            clubs.len(),
            self.user.id
        );

        // Matching: OR across the user's filters. When several filters match
        // the same instance the first one (by filter id) is recorded as the
        // obligation's origin.
        let mut matched: HashMap<String, NotificationObligation> = HashMap::new();
        for filter in &filters {
            for instance in matching_instances(&instances, filter) {
                matched
                    .entry(instance.external_id.clone())
                    .or_insert_with(|| {
                        NotificationObligation::new(
                            self.user.id.clone(),
                            filter.id.clone(),
                            instance,
                        )
                    });
            }
        }
        report.matched = matched.len();

        // Ledger gate: only pairs without an entry become obligations
        let mut obligations = Vec::new();
        for (key, obligation) in matched {
            match ctx.repos.ledger.is_new(&self.user.id, &key).await {
                Ok(true) => obligations.push(obligation),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "Ledger lookup failed for ({}, {}), deferring to next cycle: {}",
                        self.user.id, key, e
                    );
                    report.deferred += 1;
                }
            }
        }
        obligations.sort();
        report.obligations = obligations.len();

        // Dispatch in stable order, committing synchronously per obligation
        // so a crash can lose or duplicate at most one notification
        let mut obligations = obligations.into_iter();
        while let Some(obligation) = obligations.next() {
            if self.stop.is_cancelled() {
                report.outcome = SliceOutcome::Cancelled;
                report.deferred += 1 + obligations.len();
                return Ok(report);
            }
            let message = render_notification(&self.user, &obligation, &self.names);
            match ctx.providers.delivery.deliver(&message).await {
                Ok(DeliveryReceipt::Accepted) => {
                    let entry = LedgerEntry {
                        user_id: self.user.id.clone(),
                        instance_key: obligation.instance_key().to_string(),
                        sent_at: ctx.sys.get_timestamp_millis(),
                        instance_start_ts: obligation.instance.start_ts,
                    };
                    match ctx.repos.ledger.commit(&entry).await {
                        Ok(true) => report.dispatched += 1,
                        Ok(false) => {
                            // Another commit won the race; the pair is
                            // recorded either way
                            warn!(
                                "Ledger already held ({}, {}) at commit time",
                                self.user.id, entry.instance_key
                            );
                            report.dispatched += 1;
                        }
                        Err(e) => {
                            warn!(
                                "Ledger commit failed for ({}, {}): {}",
                                self.user.id, entry.instance_key, e
                            );
                            report.deferred += 1;
                        }
                    }
                }
                Ok(DeliveryReceipt::Rejected { reason }) => {
                    warn!(
                        "Delivery rejected for ({}, {}), retrying next cycle: {}",
                        self.user.id,
                        obligation.instance_key(),
                        reason
                    );
                    report.rejected += 1;
                }
                Err(DeliveryError::Transient(e)) => {
                    warn!(
                        "Delivery failed for ({}, {}), retrying next cycle: {}",
                        self.user.id,
                        obligation.instance_key(),
                        e
                    );
                    report.deferred += 1;
                }
            }
        }

        info!(
            "Checked user {}: {} matched, {} owed, {} dispatched",
            self.user.id, report.matched, report.obligations, report.dispatched
        );
        Ok(report)
    }
}

/// The clubs a slice must fetch: the union of clubs named by the user's
/// filters. A club-unrestricted filter widens this to every club the cached
/// catalog knows.
fn clubs_to_fetch(filters: &[UserFilter], names: &NameDirectory) -> Vec<String> {
    let mut clubs = BTreeSet::new();
    for filter in filters {
        match &filter.club {
            Predicate::Any => clubs.extend(names.club_ids()),
            _ => {
                if let Some(ids) = filter.club_ids() {
                    clubs.extend(ids.iter().map(|id| id.to_string()));
                }
            }
        }
    }
    clubs.into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::usecase::execute;
    use chrono::{TimeZone, Weekday};
    use chrono_tz::Tz;
    use classwatch_domain::{
        CatalogDimension, CatalogEntry, ClassInstance, TimeOfDayRange, UserFilter,
    };
    use classwatch_infra::{
        ClasswatchContext, FixedTimeSys, InMemoryDeliveryChannel, InMemoryUpstreamProvider,
        ScriptedDelivery,
    };
    use std::sync::Arc;

    const WARSAW: Tz = chrono_tz::Europe::Warsaw;

    struct TestContext {
        ctx: ClasswatchContext,
        upstream: Arc<InMemoryUpstreamProvider>,
        delivery: Arc<InMemoryDeliveryChannel>,
        user: User,
        window: TimeSpan,
    }

    /// Monday 2021-06-07 00:00 Warsaw, the start of the reference window
    fn window_start() -> i64 {
        WARSAW.ymd(2021, 6, 7).and_hms(0, 0, 0).timestamp_millis()
    }

    async fn setup() -> TestContext {
        let upstream = Arc::new(InMemoryUpstreamProvider::new());
        let delivery = Arc::new(InMemoryDeliveryChannel::new());
        let mut ctx =
            ClasswatchContext::create_inmemory(upstream.clone(), delivery.clone());
        ctx.sys = Arc::new(FixedTimeSys(window_start()));

        let user = User::new("chat-1", "jane@example.com");
        ctx.repos.users.insert(&user).await.unwrap();

        let window = TimeSpan::new(window_start(), window_start() + 48 * 60 * 60 * 1000);
        TestContext {
            ctx,
            upstream,
            delivery,
            user,
            window,
        }
    }

    fn monday_19_instance(external_id: &str, free_spots: u32) -> ClassInstance {
        ClassInstance {
            external_id: external_id.into(),
            club_id: "A".into(),
            zone_id: "10".into(),
            class_type_id: "104".into(),
            trainer_id: None,
            name: "Mobility".into(),
            start_ts: WARSAW.ymd(2021, 6, 7).and_hms(19, 0, 0).timestamp_millis(),
            duration: 55 * 60 * 1000,
            capacity: 20,
            free_spots,
            timezone: WARSAW,
        }
    }

    fn monday_filter(user_id: &ID) -> UserFilter {
        let mut filter = UserFilter::new(user_id.clone());
        filter.club = Predicate::Exactly("A".into());
        filter.weekdays = Predicate::OneOf(vec![Weekday::Mon]);
        filter.time_of_day = Some(TimeOfDayRange::new(
            "18:00".parse().unwrap(),
            "20:00".parse().unwrap(),
        ));
        filter
    }

    fn usecase(test: &TestContext) -> CheckUserUseCase {
        CheckUserUseCase {
            user: test.user.clone(),
            window: test.window.clone(),
            names: NameDirectory::new(),
            stop: StopSignal::new(),
        }
    }

    #[actix_rt::test]
    async fn matching_new_instance_dispatches_once_and_commits() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.outcome, SliceOutcome::Completed);
        assert_eq!(report.matched, 1);
        assert_eq!(report.obligations, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(test.delivery.sent().len(), 1);
        assert!(!test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());
    }

    #[actix_rt::test]
    async fn flapping_availability_never_renotifies() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();

        // First cycle: 2 free spots, notify
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);
        execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(test.delivery.sent().len(), 1);

        // Second cycle: full class, excluded by the matcher, ledger untouched
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 0)]);
        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.matched, 0);
        assert!(!test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());

        // Third cycle: spots reopened, matches again but stays suppressed
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 3)]);
        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.obligations, 0);
        assert_eq!(test.delivery.sent().len(), 1);
    }

    #[actix_rt::test]
    async fn rejected_delivery_leaves_the_obligation_owed() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);
        test.delivery
            .push_script(ScriptedDelivery::Reject("blocked".into()));

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.dispatched, 0);
        assert!(test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());

        // Next cycle the unscripted channel accepts and the pair commits
        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.dispatched, 1);
        assert!(!test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());
    }

    #[actix_rt::test]
    async fn transient_delivery_failure_defers_without_commit() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);
        test.delivery
            .push_script(ScriptedDelivery::Transient("timeout".into()));

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(test.delivery.sent().len(), 0);
        assert!(test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());
    }

    #[actix_rt::test]
    async fn fetch_failure_aborts_the_slice_without_ledger_effects() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);
        test.upstream
            .push_fetch_failure(FetchError::Transient("upstream 503".into()));

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.outcome, SliceOutcome::AbortedFetch);
        assert_eq!(test.delivery.sent().len(), 0);
        assert!(test.ctx.repos.ledger.is_new(&test.user.id, "cls-1").await.unwrap());
    }

    #[actix_rt::test]
    async fn auth_failure_aborts_the_slice() {
        let test = setup().await;
        test.ctx
            .repos
            .filters
            .insert(&monday_filter(&test.user.id))
            .await
            .unwrap();
        test.upstream.fail_auth_for(&test.user.id);

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.outcome, SliceOutcome::AbortedAuth);
        assert_eq!(test.delivery.sent().len(), 0);
    }

    #[actix_rt::test]
    async fn overlapping_filters_yield_one_obligation_per_instance() {
        let test = setup().await;
        let first = monday_filter(&test.user.id);
        let mut second = monday_filter(&test.user.id);
        second.time_of_day = None;
        test.ctx.repos.filters.insert(&first).await.unwrap();
        test.ctx.repos.filters.insert(&second).await.unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);

        let report = execute(usecase(&test), &test.ctx).await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(test.delivery.sent().len(), 1);
    }

    #[actix_rt::test]
    async fn dispatch_order_is_stable_by_start_time() {
        let test = setup().await;
        let mut filter = monday_filter(&test.user.id);
        filter.time_of_day = None;
        test.ctx.repos.filters.insert(&filter).await.unwrap();

        let mut late = monday_19_instance("late", 2);
        late.start_ts += 2 * 60 * 60 * 1000;
        let early = monday_19_instance("early", 2);
        test.upstream.set_classes(vec![late, early]);

        execute(usecase(&test), &test.ctx).await.unwrap();
        let sent = test.delivery.sent();
        assert_eq!(sent.len(), 2);
        // Earlier class start dispatches first regardless of fetch order
        assert!(sent[0].text.contains("19:00"));
        assert!(sent[1].text.contains("21:00"));
    }

    #[actix_rt::test]
    async fn cancelled_slice_dispatches_nothing() {
        let test = setup().await;
        let mut filter = monday_filter(&test.user.id);
        filter.time_of_day = None;
        test.ctx.repos.filters.insert(&filter).await.unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);

        let mut usecase = usecase(&test);
        usecase.stop.cancel();
        let report = execute(usecase, &test.ctx).await.unwrap();
        assert_eq!(report.outcome, SliceOutcome::Cancelled);
        assert_eq!(test.delivery.sent().len(), 0);
    }

    #[actix_rt::test]
    async fn club_unrestricted_filter_fetches_catalog_clubs() {
        let test = setup().await;
        let mut filter = monday_filter(&test.user.id);
        filter.club = Predicate::Any;
        filter.time_of_day = None;
        test.ctx.repos.filters.insert(&filter).await.unwrap();
        test.upstream
            .set_classes(vec![monday_19_instance("cls-1", 2)]);

        let mut names = NameDirectory::new();
        names.add(&classwatch_domain::CatalogSnapshot {
            dimension: CatalogDimension::Clubs,
            entries: vec![CatalogEntry {
                id: "A".into(),
                name: "Alpha".into(),
            }],
            refreshed_at: 0,
        });

        let mut usecase = usecase(&test);
        usecase.names = names;
        let report = execute(usecase, &test.ctx).await.unwrap();
        assert_eq!(report.dispatched, 1);
    }
}
