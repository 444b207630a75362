#![no_main]
use libfuzzer_sys::fuzz_target;

use covtrend::aggregate::aggregate_profile;
use covtrend::ignore::IgnoreFilter;

fuzz_target!(|data: &[u8]| {
    // Neither parsing nor aggregation may panic on any input.
    let _ = covtrend::parser::parse(data);
    if let Ok(agg) = aggregate_profile(data, &IgnoreFilter::default()) {
        let pct = agg.global_pct();
        assert!((0.0..=100.0).contains(&pct));
        let mut out = Vec::new();
        let _ = agg.write_merged(&mut out);
    }
});
