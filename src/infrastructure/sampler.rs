//! Default leaf sampler backed by `rand`

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Builder;

use crate::domain::LeafSpec;
use crate::infrastructure::traits::LeafSampler;

/// Uniform sampling within the bounds of each leaf spec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomLeafSampler;

impl LeafSampler for RandomLeafSampler {
    fn sample(&self, spec: &LeafSpec, rng: &mut StdRng) -> Value {
        match spec {
            LeafSpec::Bool => Value::Bool(rng.random_bool(0.5)),
            LeafSpec::Integer { min, max } => {
                let (lo, hi) = ordered(*min, *max);
                json!(rng.random_range(lo..=hi))
            }
            LeafSpec::Float { min, max } => json!(uniform_f64(*min, *max, rng)),
            LeafSpec::String { min_len, max_len } => {
                let (lo, hi) = ordered(*min_len, *max_len);
                let len = rng.random_range(lo..=hi);
                let text: String = (0..len).map(|_| rng.sample(Alphanumeric) as char).collect();
                Value::String(text)
            }
            LeafSpec::OneOf(choices) => {
                if choices.is_empty() {
                    Value::Null
                } else {
                    choices[rng.random_range(0..choices.len())].clone()
                }
            }
            LeafSpec::Uuid => {
                let uuid = Builder::from_random_bytes(rng.random()).into_uuid();
                Value::String(uuid.to_string())
            }
        }
    }
}

/// Uniform within `[min, max]`; interpolating keeps spans wider than `f64::MAX` finite.
fn uniform_f64(min: f64, max: f64, rng: &mut StdRng) -> f64 {
    let bound = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(f64::MIN, f64::MAX) };
    let (lo, hi) = ordered(bound(min), bound(max));
    let t: f64 = rng.random();
    (lo * (1.0 - t) + hi * t).clamp(lo, hi)
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rstest::rstest;

    #[rstest]
    #[case(LeafSpec::Integer { min: 3, max: 7 })]
    #[case(LeafSpec::Integer { min: 7, max: 3 })]
    fn given_integer_bounds_when_sampling_then_within_range(#[case] spec: LeafSpec) {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let n = RandomLeafSampler.sample(&spec, &mut rng).as_i64().unwrap();
            assert!((3..=7).contains(&n));
        }
    }

    #[rstest]
    #[case(0.5, 2.5)]
    #[case(2.5, 0.5)]
    #[case(1.0, 1.0)]
    #[case(-1e308, 1e308)]
    #[case(f64::MIN, f64::MAX)]
    #[case(1e308, f64::MAX)]
    fn given_float_bounds_when_sampling_then_finite_and_within_range(
        #[case] min: f64,
        #[case] max: f64,
    ) {
        let mut rng = StdRng::seed_from_u64(9);
        let (lo, hi) = ordered(min, max);
        for _ in 0..50 {
            let value = RandomLeafSampler.sample(&LeafSpec::Float { min, max }, &mut rng);
            let x = value.as_f64().unwrap();
            assert!(x.is_finite());
            assert!((lo..=hi).contains(&x), "{x} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn given_infinite_bound_when_sampling_then_still_a_number() {
        let mut rng = StdRng::seed_from_u64(9);
        let spec = LeafSpec::Float { min: f64::NEG_INFINITY, max: 0.0 };
        let value = RandomLeafSampler.sample(&spec, &mut rng);
        assert!(value.as_f64().is_some_and(|x| x.is_finite() && x <= 0.0));
    }

    #[test]
    fn given_string_spec_when_sampling_then_length_within_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let spec = LeafSpec::String { min_len: 2, max_len: 5 };
        for _ in 0..50 {
            let value = RandomLeafSampler.sample(&spec, &mut rng);
            let len = value.as_str().unwrap().len();
            assert!((2..=5).contains(&len));
        }
    }

    #[test]
    fn given_same_seed_when_sampling_uuid_then_reproducible() {
        let a = RandomLeafSampler.sample(&LeafSpec::Uuid, &mut StdRng::seed_from_u64(1));
        let b = RandomLeafSampler.sample(&LeafSpec::Uuid, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert_eq!(a.as_str().unwrap().len(), 36);
    }

    #[test]
    fn given_choices_when_sampling_then_picks_one_of_them() {
        let mut rng = StdRng::seed_from_u64(4);
        let spec = LeafSpec::OneOf(vec![json!("a"), json!("b")]);
        let value = RandomLeafSampler.sample(&spec, &mut rng);
        assert!(value == json!("a") || value == json!("b"));
        assert_eq!(
            RandomLeafSampler.sample(&LeafSpec::OneOf(vec![]), &mut rng),
            Value::Null
        );
    }
}
