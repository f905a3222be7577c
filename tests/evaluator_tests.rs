mod common;

use std::time::Duration;

use common::{as_prober, Reply, ScriptedProber, PROBE_HOST};
use proxy_probe::config::CheckerConfig;
use proxy_probe::evaluator::LivenessEvaluator;
use proxy_probe::types::LivenessRecord;

fn evaluator(prober: ScriptedProber) -> LivenessEvaluator {
    let (_, prober) = as_prober(prober);
    let config = CheckerConfig::new()
        .with_probe_host(PROBE_HOST)
        .with_timeout(Duration::from_millis(300));
    LivenessEvaluator::new(prober, config)
}

#[tokio::test]
async fn relaying_proxy_is_live() {
    let ev = evaluator(ScriptedProber::new().reply(
        "1.2.3.4",
        Reply::Body(r#"{"myip":"1.2.3.4","countryCode":"US","org":"Acme"}"#, 42),
    ));

    let rec = ev.evaluate("1.2.3.4:443").await;
    assert!(rec.is_live);
    assert_eq!(rec.proxy_host.as_deref(), Some("1.2.3.4"));
    assert_eq!(rec.proxy_port, Some(443));
    assert_eq!(rec.observed_ip.as_deref(), Some("1.2.3.4"));
    // proxied latency only, never the direct probe's
    assert_eq!(rec.latency_ms, Some(42));
    assert_eq!(rec.country(), Some("US"));
    assert_eq!(rec.organization(), Some("Acme"));
    assert!(!rec.metadata.contains_key("myip"));
}

#[tokio::test]
async fn self_loop_is_not_live() {
    let ev = evaluator(
        ScriptedProber::new().reply("5.5.5.5", Reply::Body(r#"{"myip":"9.9.9.9","org":"Other"}"#, 10)),
    );
    assert_eq!(ev.evaluate("5.5.5.5:443").await, LivenessRecord::not_live());
}

#[tokio::test]
async fn proxied_failure_yields_bare_negative() {
    let ev = evaluator(ScriptedProber::new().reply("6.6.6.6", Reply::Refused));
    assert_eq!(ev.evaluate("6.6.6.6:8443").await, LivenessRecord::not_live());
}

#[tokio::test]
async fn unparseable_or_addressless_bodies_are_not_live() {
    let ev = evaluator(
        ScriptedProber::new()
            .reply("7.7.7.1", Reply::Body("<html>blocked</html>", 5))
            .reply("7.7.7.2", Reply::Body(r#"{"countryCode":"US"}"#, 5))
            .reply("7.7.7.3", Reply::Body(r#"{"myip":""}"#, 5))
            .reply("7.7.7.4", Reply::Body("", 5)),
    );
    for host in ["7.7.7.1", "7.7.7.2", "7.7.7.3", "7.7.7.4"] {
        assert!(!ev.evaluate(host).await.is_live, "{host}");
    }
}

#[tokio::test]
async fn malformed_token_short_circuits() {
    let ev = evaluator(ScriptedProber::new());
    assert!(!ev.evaluate("bad::token").await.is_live);
    assert!(!ev.evaluate("").await.is_live);
}

#[tokio::test(start_paused = true)]
async fn hanging_proxy_costs_one_timeout() {
    let ev = evaluator(ScriptedProber::new().reply("8.8.4.4", Reply::Hang));
    let start = tokio::time::Instant::now();
    let rec = ev.evaluate("8.8.4.4").await;
    assert!(!rec.is_live);
    assert!(start.elapsed() < Duration::from_millis(600));
}
