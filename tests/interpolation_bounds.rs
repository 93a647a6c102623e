use agrocast::spatial::interpolator::Interpolator;
use agrocast::spatial::location_table::LocationTable;
use agrocast::{Observation, Provenance, SeriesField, WeatherReading};
use chrono::NaiveDate;
use proptest::prelude::*;

const DISTRICTS: [&str; 14] = [
    "WADASLINTANG",
    "KALIBAWANG",
    "KEJAJAR",
    "GARUNG",
    "LEKSONO",
    "KALIWIRO",
    "SAPURAN",
    "KEPIL",
    "KALIKAJAR",
    "KERTEK",
    "MOJOTENGAH",
    "SELOMERTO",
    "SUKOHARJO",
    "WATUMALANG",
];

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

proptest! {
    #[test]
    fn interpolated_fields_stay_within_candidate_range(
        readings in proptest::collection::vec(
            (10.0f64..35.0, 40.0f64..100.0, 0.0f64..60.0, 0.0f64..15.0),
            1..DISTRICTS.len(),
        ),
        k in 1usize..6,
    ) {
        let same_day: Vec<Observation> = readings
            .iter()
            .zip(DISTRICTS)
            .map(|(&(temperature, humidity, rainfall, wind_speed), name)| {
                let reading = WeatherReading { temperature, humidity, rainfall, wind_speed };
                Observation::weather(name, date(), reading, "prop")
            })
            .collect();

        let table = LocationTable::default();
        let estimate = Interpolator::new(&table)
            .interpolate("WONOSOBO", date(), k, &same_day)
            .unwrap();
        let Provenance::Interpolated(details) = &estimate.provenance else {
            panic!("expected an interpolated estimate");
        };
        prop_assert_eq!(details.sources.len(), k.min(same_day.len()));
        prop_assert!(details.sources.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

        let reading = estimate.reading().unwrap();
        for field in SeriesField::WEATHER {
            let range = details.range(field).unwrap();
            let value = reading.get(field).unwrap();
            prop_assert!(value >= range.min - 1e-9 && value <= range.max + 1e-9);
        }
    }
}
