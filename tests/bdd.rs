use std::{collections::HashMap, fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use cucumber::{given, then, when, World as _};

use bunk::{
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::init_pool,
    error::AppError,
    models::{booking::Booking, station::Station},
    routes::parse_slot_time,
    services::stations::StationUpdate,
    state::AppState,
};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    users: HashMap<String, AuthenticatedUser>,
    stations: HashMap<String, Station>,
    bookings: HashMap<String, Booking>,
    last_error: Option<AppError>,
    race_results: Vec<Result<Booking, AppError>>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self, username: &str) -> &AuthenticatedUser {
        self.users
            .get(username)
            .expect("user must be registered before use")
    }

    fn station_id(&self, name: &str) -> String {
        self.stations
            .get(name)
            .map(|station| station.id.clone())
            .unwrap_or_else(|| name.to_string())
    }

    fn booking_id(&self, username: &str) -> String {
        self.bookings
            .get(username)
            .expect("user must hold a booking")
            .id
            .clone()
    }

    async fn refetch_booking(&self, username: &str) -> Booking {
        self.app_state()
            .ledger
            .get(&self.booking_id(username))
            .await
            .expect("booking must still exist")
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: "bdd-cookie-secret".into(),
            session_ttl_days: 1,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let app = AppState::new(config, db);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.users.clear();
    world.stations.clear();
    world.bookings.clear();
    world.last_error = None;
    world.race_results.clear();
}

#[given(
    regex = r#"^a registered user "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#
)]
async fn given_registered_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    let created = auth::register_user(world.app_state(), &username, &email, &password)
        .await
        .expect("register user");
    world.users.insert(username, created);
}

#[when(
    regex = r#"^I register a user "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#
)]
async fn when_register_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    match auth::register_user(world.app_state(), &username, &email, &password).await {
        Ok(created) => {
            world.users.insert(username, created);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[then(regex = r#"^I can authenticate as "([^"]+)" using password "([^"]+)"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, identifier: String, password: String) {
    let authed = auth::authenticate_user(world.app_state(), &identifier, &password)
        .await
        .expect("authentication");
    assert_eq!(authed.username, identifier);
}

#[then("the registration is rejected")]
async fn then_registration_rejected(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::BadRequest(_))),
        "expected a rejected registration, got {:?}",
        world.last_error
    );
}

#[then(regex = r#"^authenticating as "([^"]+)" with password "([^"]+)" fails$"#)]
async fn then_authentication_fails(world: &mut AppWorld, identifier: String, password: String) {
    let result = auth::authenticate_user(world.app_state(), &identifier, &password).await;
    assert!(
        matches!(result, Err(AppError::Unauthorized)),
        "expected Unauthorized, got {result:?}"
    );
}

#[given(regex = r#"^a charging station "([^"]+)"$"#)]
async fn given_station(world: &mut AppWorld, name: String) {
    let station = world
        .app_state()
        .stations
        .create(&name, "Test Alley 1", "CCS")
        .await
        .expect("create station");
    world.stations.insert(name, station);
}

#[given(regex = r#"^station "([^"]+)" is retired$"#)]
async fn given_station_retired(world: &mut AppWorld, name: String) {
    let station_id = world.station_id(&name);
    let updated = world
        .app_state()
        .stations
        .update(
            &station_id,
            StationUpdate {
                active: Some(false),
                ..StationUpdate::default()
            },
        )
        .await
        .expect("retire station");
    world.stations.insert(name, updated);
}

#[when(regex = r#"^"([^"]+)" books station "([^"]+)" at "([^"]+)"$"#)]
async fn when_book(world: &mut AppWorld, username: String, station: String, raw_time: String) {
    let slot_time = match parse_slot_time(Some(&raw_time)) {
        Ok(slot_time) => slot_time,
        Err(err) => {
            world.last_error = Some(err);
            return;
        }
    };
    let user_id = world.user(&username).id;
    let station_id = world.station_id(&station);
    match world
        .app_state()
        .ledger
        .create(user_id, &station_id, slot_time)
        .await
    {
        Ok(booking) => {
            world.bookings.insert(username, booking);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^"([^"]+)" cancels her booking$"#)]
async fn when_cancel(world: &mut AppWorld, username: String) {
    let booking_id = world.booking_id(&username);
    match world.app_state().ledger.cancel(&booking_id).await {
        Ok(booking) => {
            world.bookings.insert(username, booking);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^"([^"]+)" reschedules her booking to "([^"]+)"$"#)]
async fn when_reschedule(world: &mut AppWorld, username: String, raw_time: String) {
    let slot_time = match parse_slot_time(Some(&raw_time)) {
        Ok(slot_time) => slot_time,
        Err(err) => {
            world.last_error = Some(err);
            return;
        }
    };
    let booking_id = world.booking_id(&username);
    match world
        .app_state()
        .ledger
        .reschedule(&booking_id, slot_time)
        .await
    {
        Ok(booking) => {
            world.bookings.insert(username, booking);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^"([^"]+)" and "([^"]+)" race to book station "([^"]+)" at "([^"]+)"$"#)]
async fn when_race(
    world: &mut AppWorld,
    first: String,
    second: String,
    station: String,
    raw_time: String,
) {
    let slot_time = parse_slot_time(Some(&raw_time)).expect("race slot time must parse");
    let first_id = world.user(&first).id;
    let second_id = world.user(&second).id;
    let station_id = world.station_id(&station);
    let ledger = world.app_state().ledger.clone();

    let (left, right) = tokio::join!(
        ledger.create(first_id, &station_id, slot_time),
        ledger.create(second_id, &station_id, slot_time),
    );
    world.race_results = vec![left, right];
}

#[then("the booking succeeds")]
async fn then_booking_succeeds(world: &mut AppWorld) {
    assert!(
        world.last_error.is_none(),
        "expected success, got {:?}",
        world.last_error
    );
}

#[then("the booking fails with a slot conflict")]
async fn then_slot_conflict(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::SlotConflict)),
        "expected SlotConflict, got {:?}",
        world.last_error
    );
}

#[then("the booking fails with not found")]
async fn then_not_found(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::NotFound)),
        "expected NotFound, got {:?}",
        world.last_error
    );
}

#[then("the booking request is rejected as invalid")]
async fn then_invalid(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::BadRequest(_))),
        "expected BadRequest, got {:?}",
        world.last_error
    );
}

#[then(regex = r#"^station "([^"]+)" is (available|unavailable) at "([^"]+)"$"#)]
async fn then_availability(world: &mut AppWorld, station: String, expected: String, raw: String) {
    let slot_time = parse_slot_time(Some(&raw)).expect("slot time must parse");
    let station_id = world.station_id(&station);
    let available = world
        .app_state()
        .ledger
        .availability(&station_id, slot_time)
        .await
        .expect("availability check");
    assert_eq!(available, expected == "available");
}

#[then(regex = r#"^"([^"]+)"'s booking has status "([^"]+)"$"#)]
async fn then_booking_status(world: &mut AppWorld, username: String, status: String) {
    let booking = world.refetch_booking(&username).await;
    assert_eq!(booking.status, status);
}

#[then(regex = r#"^"([^"]+)"'s booking shows slot time "([^"]+)"$"#)]
async fn then_booking_slot(world: &mut AppWorld, username: String, raw: String) {
    let expected: DateTime<Utc> = parse_slot_time(Some(&raw)).expect("slot time must parse");
    let booking = world.refetch_booking(&username).await;
    assert_eq!(booking.slot_time, expected);
}

#[then("exactly one racing booking wins the slot")]
async fn then_single_winner(world: &mut AppWorld) {
    let winners = world
        .race_results
        .iter()
        .filter(|result| result.is_ok())
        .count();
    assert_eq!(winners, 1, "race results: {:?}", world.race_results);
    for result in &world.race_results {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::SlotConflict),
                "losing writer must see SlotConflict, got {err:?}"
            );
        }
    }
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
