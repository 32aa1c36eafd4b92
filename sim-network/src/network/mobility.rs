//! Node mobility
//!
//! Positions are a pure function of the node's mobility parameters and the elapsed virtual time,
//! so querying them never mutates shared state and always yields the same answer.

use crate::error::SimulationError;
use crate::network::node::Position;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub enum Mobility {
    #[default]
    Fixed,
    RandomWalk(RandomWalk),
}

impl Mobility {
    pub fn position_at(&self, initial_position: Position, elapsed: Duration) -> Position {
        match self {
            Mobility::Fixed => initial_position,
            Mobility::RandomWalk(walk) => walk.position_at(initial_position, elapsed),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SimulationError> {
        match self {
            Mobility::Fixed => Ok(()),
            Mobility::RandomWalk(walk) => walk.validate(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rectangle {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.x_min..=self.x_max).contains(&position.x)
            && (self.y_min..=self.y_max).contains(&position.y)
    }

    /// Folds a position back into the rectangle, as if it had bounced off its edges
    pub fn reflect(&self, position: Position) -> Position {
        Position {
            x: reflect_coordinate(position.x, self.x_min, self.x_max),
            y: reflect_coordinate(position.y, self.y_min, self.y_max),
        }
    }

    fn validate(&self) -> Result<(), SimulationError> {
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(SimulationError::Configuration(format!(
                "invalid random walk bounds: {self:?}"
            )));
        }

        Ok(())
    }
}

fn reflect_coordinate(value: f64, min: f64, max: f64) -> f64 {
    let width = max - min;
    let offset = (value - min).rem_euclid(2.0 * width);
    if offset <= width {
        min + offset
    } else {
        max - (offset - width)
    }
}

/// Two-dimensional random walk inside a rectangle
///
/// The walk is split in legs of equal duration. At the beginning of each leg a direction and a
/// speed are drawn at random; the node then moves in a straight line, bouncing off the edges of
/// the rectangle.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    pub bounds: Rectangle,
    pub min_speed: f64,
    pub max_speed: f64,
    pub leg_duration: Duration,
    pub seed: u64,
}

impl RandomWalk {
    pub fn new(bounds: Rectangle, seed: u64) -> Self {
        Self {
            bounds,
            min_speed: 2.0,
            max_speed: 4.0,
            leg_duration: Duration::from_secs(1),
            seed,
        }
    }

    pub fn position_at(&self, initial_position: Position, elapsed: Duration) -> Position {
        let mut rng = Rng::with_seed(self.seed);
        let mut position = self.bounds.reflect(initial_position);

        let leg_nanos = self.leg_duration.as_nanos();
        let full_legs = elapsed.as_nanos() / leg_nanos;
        let last_leg = Duration::from_nanos((elapsed.as_nanos() % leg_nanos) as u64);

        for _ in 0..full_legs {
            position = self.walk_leg(&mut rng, position, self.leg_duration);
        }

        if !last_leg.is_zero() {
            position = self.walk_leg(&mut rng, position, last_leg);
        }

        position
    }

    fn walk_leg(&self, rng: &mut Rng, from: Position, duration: Duration) -> Position {
        // Both values must be drawn even for partial legs, so the random sequence stays aligned
        let direction = rng.f64() * TAU;
        let speed = self.min_speed + rng.f64() * (self.max_speed - self.min_speed);

        let distance = speed * duration.as_secs_f64();
        self.bounds.reflect(Position {
            x: from.x + direction.cos() * distance,
            y: from.y + direction.sin() * distance,
        })
    }

    fn validate(&self) -> Result<(), SimulationError> {
        self.bounds.validate()?;

        if self.leg_duration.is_zero() {
            return Err(SimulationError::Configuration(
                "random walk legs must have a non-zero duration".to_string(),
            ));
        }

        if !(self.min_speed >= 0.0 && self.min_speed <= self.max_speed && self.max_speed.is_finite())
        {
            return Err(SimulationError::Configuration(format!(
                "invalid random walk speed range: [{}, {}]",
                self.min_speed, self.max_speed
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn walk() -> RandomWalk {
        RandomWalk::new(Rectangle::new(100.0, 300.0, 100.0, 300.0), 42)
    }

    #[test]
    fn test_reflect_coordinate() {
        let cases = [
            (150.0, 150.0),
            (100.0, 100.0),
            (300.0, 300.0),
            (310.0, 290.0),
            (90.0, 110.0),
            // Bounces off both edges
            (520.0, 120.0),
            (-120.0, 280.0),
        ];

        for (input, expected) in cases {
            let reflected = reflect_coordinate(input, 100.0, 300.0);
            assert!((reflected - expected).abs() < 1e-9, "{input} -> {reflected}");
        }
    }

    #[test]
    fn test_fixed_mobility_never_moves() {
        let start = Position::new(12.0, 34.0);
        for secs in [0, 1, 100, 10_000] {
            assert_eq!(
                Mobility::Fixed.position_at(start, Duration::from_secs(secs)),
                start
            );
        }
    }

    #[test]
    fn test_random_walk_starts_at_initial_position() {
        let start = Position::new(200.0, 200.0);
        assert_eq!(walk().position_at(start, Duration::ZERO), start);
    }

    #[test]
    fn test_random_walk_stays_in_bounds() {
        let walk = walk();
        let start = Position::new(290.0, 110.0);
        for millis in (0..600_000).step_by(250) {
            let position = walk.position_at(start, Duration::from_millis(millis));
            assert!(walk.bounds.contains(position), "{position:?} at {millis} ms");
        }
    }

    #[test]
    fn test_random_walk_is_deterministic() {
        let start = Position::new(200.0, 200.0);
        let elapsed = Duration::from_millis(12_345);

        let first = walk().position_at(start, elapsed);
        let second = walk().position_at(start, elapsed);
        assert_eq!(first, second);

        let other_seed = RandomWalk { seed: 7, ..walk() }.position_at(start, elapsed);
        assert_ne!(first, other_seed);
    }

    #[test]
    fn test_random_walk_moves_continuously() {
        let walk = walk();
        let start = Position::new(200.0, 200.0);

        // Within a leg, the node moves in a straight line at a speed of at most `max_speed`
        let mut previous = start;
        for millis in (100..=5_000).step_by(100) {
            let position = walk.position_at(start, Duration::from_millis(millis));
            assert!(position.distance_to(previous) <= walk.max_speed * 0.1 + 1e-9);
            previous = position;
        }

        assert_ne!(previous, start);
    }

    #[test]
    fn test_invalid_random_walk_is_rejected() {
        let empty_bounds = RandomWalk::new(Rectangle::new(100.0, 100.0, 0.0, 10.0), 1);
        assert!(Mobility::RandomWalk(empty_bounds).validate().is_err());

        let zero_legs = RandomWalk {
            leg_duration: Duration::ZERO,
            ..walk()
        };
        assert!(Mobility::RandomWalk(zero_legs).validate().is_err());

        let inverted_speed = RandomWalk {
            min_speed: 5.0,
            max_speed: 1.0,
            ..walk()
        };
        assert!(Mobility::RandomWalk(inverted_speed).validate().is_err());

        assert!(Mobility::RandomWalk(walk()).validate().is_ok());
    }
}
