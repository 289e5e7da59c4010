// Built-in demo feed: keeps the HUD alive without a race simulator attached.

use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

use super::{MessageSource, TelemetryEvent, TransportMessage};
use crate::errors::PitwallError;
use crate::roster::{GForcePatch, TelemetryPatch, TireTempsPatch};
use crate::session::RaceStateSync;

pub const SIM_REFRESH_RATE_MS: u64 = 100;

/// Full grid cycles between race-state syncs.
const SYNC_EVERY_CYCLES: u64 = 100;
/// Full grid cycles per session lap.
const CYCLES_PER_LAP: u64 = 600;
/// Ticks a simulated pit stop lasts.
const PIT_STOP_CYCLES: u64 = 40;

const SIM_GRID: [(&str, &str); 5] = [
    ("22", "JOEY LOGANO"),
    ("8", "KYLE BUSCH"),
    ("9", "CHASE ELLIOTT"),
    ("11", "DENNY HAMLIN"),
    ("12", "RYAN BLANEY"),
];

struct SimCar {
    number: &'static str,
    name: &'static str,
    speed: f32,
    lap_dist: f32,
    fuel: f32,
    tires: [f32; 4],
    pit_until: Option<u64>,
}

/// Emits jittered telemetry for a five-car grid at a fixed refresh rate,
/// with a race-state sync interleaved every few seconds.
pub struct SimulatedSource {
    refresh_ms: u64,
    cars: Vec<SimCar>,
    next_car: usize,
    cycles: u64,
    sync_pending: bool,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        SimulatedSource::new(SIM_REFRESH_RATE_MS)
    }
}

impl SimulatedSource {
    pub fn new(refresh_ms: u64) -> Self {
        let mut rng = rand::rng();
        let cars = SIM_GRID
            .into_iter()
            .map(|(number, name)| SimCar {
                number,
                name,
                speed: 185.,
                lap_dist: rng.random_range(0.0..1.0),
                fuel: 18.,
                tires: [210., 215., 205., 208.],
                pit_until: None,
            })
            .collect();
        Self {
            refresh_ms,
            cars,
            next_car: 0,
            cycles: 0,
            sync_pending: false,
        }
    }

    fn race_state(&self) -> RaceStateSync {
        RaceStateSync {
            flag: Some("Green".to_string()),
            lap: Some((1 + self.cycles / CYCLES_PER_LAP) as u32),
            total_laps: Some(100),
            is_maintenance: Some(false),
        }
    }

    fn advance_car(&mut self, index: usize) -> TelemetryEvent {
        let mut rng = rand::rng();
        let jitter: f32 = rng.random_range(-0.5..0.5);
        let cycles = self.cycles;
        let refresh_ms = self.refresh_ms;
        let car = &mut self.cars[index];

        let in_pits = match car.pit_until {
            Some(until) if cycles < until => true,
            Some(_) => {
                car.pit_until = None;
                false
            }
            None => {
                // rare, short simulated pit stop
                if rng.random_range(0.0..1.0) < 0.001 {
                    car.pit_until = Some(cycles + PIT_STOP_CYCLES);
                    true
                } else {
                    false
                }
            }
        };

        if in_pits {
            car.speed = (car.speed * 0.8).max(45.);
        } else {
            car.speed = (car.speed + jitter * 5.).clamp(110., 198.);
        }
        let tick_scale = refresh_ms as f32 / 100.;
        car.lap_dist = (car.lap_dist + car.speed / 3600. * tick_scale) % 1.;
        car.fuel = (car.fuel - 0.0004 * tick_scale).max(0.);

        let throttle = if in_pits {
            20.
        } else if car.speed < 190. {
            100.
        } else {
            80. + jitter * 10.
        };
        let brake = if car.speed > 195. { 5. } else { 0. };
        let gear = if in_pits {
            2
        } else if car.speed > 150. {
            4
        } else {
            3
        };

        TelemetryEvent {
            car: car.number.to_string(),
            driver: car.name.to_string(),
            telemetry: TelemetryPatch {
                rpm: Some(7000. + jitter * 1000.),
                speed: Some(car.speed),
                gear: Some(gear),
                throttle: Some(throttle),
                brake: Some(brake),
                fuel: Some(car.fuel),
                lap_dist_pct: Some(car.lap_dist),
                pit_status: Some(in_pits),
                g_force: Some(GForcePatch {
                    lat: Some(jitter * 1.5),
                    long: Some(jitter * 0.8),
                }),
                tires: Some(TireTempsPatch {
                    fl: Some(car.tires[0] + jitter * 2.),
                    fr: Some(car.tires[1] + jitter * 2.),
                    rl: Some(car.tires[2] + jitter * 2.),
                    rr: Some(car.tires[3] + jitter * 2.),
                }),
            },
        }
    }
}

impl MessageSource for SimulatedSource {
    fn start(&mut self) -> Result<(), PitwallError> {
        info!("Demo grid online: {} cars", self.cars.len());
        Ok(())
    }

    fn next_message(&mut self) -> Result<TransportMessage, PitwallError> {
        if self.sync_pending {
            self.sync_pending = false;
            return Ok(TransportMessage::SyncRaceState(self.race_state()));
        }

        if self.next_car == 0 {
            thread::sleep(Duration::from_millis(self.refresh_ms));
            self.cycles += 1;
            if self.cycles % SYNC_EVERY_CYCLES == 0 {
                self.sync_pending = true;
            }
        }

        let event = self.advance_car(self.next_car);
        self.next_car = (self.next_car + 1) % self.cars.len();
        Ok(TransportMessage::Telemetry(event))
    }
}
