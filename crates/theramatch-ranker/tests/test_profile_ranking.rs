//! End-to-end: raw evidence records → hypotheses → patient ranking.

use pretty_assertions::assert_eq;
use theramatch_common::{condition_key, RawEvidenceRecord, Relation, Sign};
use theramatch_ranker::{
    rank_drugs, summarize_evidence, summarize_relation, EvidenceAggregator, PatientProfile,
};

fn record(
    id: u64,
    drug: &str,
    condition: &str,
    assay: i64,
    cases: i64,
    sign: i64,
) -> RawEvidenceRecord {
    RawEvidenceRecord {
        record_id: Some(id),
        drug_name: drug.to_string(),
        condition: condition.to_string(),
        relation: Relation::Efficacy,
        assay_class: Some(assay),
        sample_size: Some(cases),
        direction_sign: Some(sign),
    }
}

fn drugs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A small lung-cancer style evidence batch.
fn lung_batch() -> Vec<RawEvidenceRecord> {
    let l858r = condition_key("EGFR", "mutated", "L858R");
    let t790m = condition_key("EGFR", "mutated", "T790M");
    let kras = condition_key("KRAS", "mutated", "G12C");
    vec![
        record(1, "erlotinib", &l858r, 6, 170, 1),
        record(2, "erlotinib", &l858r, 3, 40, 1),
        record(3, "erlotinib", &t790m, 5, 60, -1),
        record(4, "erlotinib", &kras, 5, 90, -1),
        record(5, "osimertinib", &t790m, 6, 280, 1),
        record(6, "osimertinib", &l858r, 6, 220, 1),
        record(7, "cetuximab", &kras, 5, 30, -1),
        record(8, "cetuximab", &kras, 2, 10, 1),
        record(9, "sotorasib", &kras, 5, 120, 1),
    ]
}

#[test]
fn test_directional_dominance() {
    let records: Vec<_> =
        (0..3).map(|i| record(i, "erlotinib", "EGFR mutated L858R", 1, 20, 1)).collect();
    let summary = summarize_relation(Relation::Efficacy, &records, 0);
    let h = summary.hypotheses.iter().next().unwrap();

    assert!((h.total_score - 36.0).abs() < 1e-12);
    assert!((h.corrected_total_score - 39.8416).abs() < 1e-9);
    let pos = h.cell(Sign::Positive).unwrap();
    assert!((pos.evidence_score - 36.0).abs() < 1e-12);
    assert!((pos.corrected_evidence_score - 37.9208).abs() < 1e-9);
    assert_eq!(h.prevalent_sign(), Some(Sign::Positive));
    assert!((h.prevalent_percentage().unwrap() - 0.9518).abs() < 1e-3);
}

#[test]
fn test_symmetric_evidence_has_no_prevalence() {
    let records = vec![
        record(1, "cetuximab", "KRAS mutated G12D", 4, 50, 1),
        record(2, "cetuximab", "KRAS mutated G12D", 4, 50, -1),
    ];
    let summary = summarize_relation(Relation::Efficacy, &records, 0);
    let h = summary.hypotheses.iter().next().unwrap();
    let neg = h.cell(Sign::Negative).unwrap().corrected_score_percentage;
    let pos = h.cell(Sign::Positive).unwrap().corrected_score_percentage;
    assert_eq!(neg, pos);
    assert!((neg - 0.5).abs() < 1e-9);
    assert_eq!(h.prevalent_sign(), None);
}

#[test]
fn test_score_percentages_sum_to_one() {
    let summary = summarize_evidence(&lung_batch(), 0);
    for h in summary.hypotheses.iter() {
        let sum: f64 = Sign::ALL.iter().map(|&s| h.cell(s).unwrap().score_percentage).sum();
        assert!((sum - 1.0).abs() < 1e-9, "{}: {}", h.key, sum);
    }
}

#[test]
fn test_aggregation_is_idempotent_and_order_independent() {
    let batch = lung_batch();
    let first = EvidenceAggregator::aggregate(Relation::Efficacy, &batch).finalize();
    let second = EvidenceAggregator::aggregate(Relation::Efficacy, &batch).finalize();
    assert_eq!(first, second);

    let mut reversed = batch.clone();
    reversed.reverse();
    let third = EvidenceAggregator::aggregate(Relation::Efficacy, &reversed).finalize();
    for (a, b) in first.iter().zip(third.iter()) {
        assert_eq!(a.key, b.key);
        assert!((a.total_score - b.total_score).abs() < 1e-9);
        assert_eq!(a.prevalent_sign(), b.prevalent_sign());
    }
}

#[test]
fn test_ranking_orders_by_overall_score() {
    let _ = tracing_subscriber::fmt::try_init();
    let summary = summarize_evidence(&lung_batch(), 0);
    let candidates = drugs(&["erlotinib", "osimertinib", "cetuximab", "sotorasib"]);

    let ranked = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated T790Mp,EGFR mutated L858Rp,KRAS mutated G12Cm",
        &candidates,
        Relation::Efficacy,
        0.5,
    );

    // sotorasib only has KRAS evidence, and the patient is KRAS negative
    let names: Vec<&str> = ranked.iter().map(|r| r.drug_name.as_str()).collect();
    assert_eq!(names[0], "osimertinib");
    assert!(names.contains(&"sotorasib"));
    for pair in ranked.windows(2) {
        assert!(pair[0].overall_score >= pair[1].overall_score);
    }

    let osimertinib = &ranked[0];
    assert!(osimertinib.overall_score > 0.9);
    assert!((osimertinib.variance - osimertinib.standard_error.powi(2)).abs() < 1e-12);
    assert!(osimertinib.p_value < 0.05);

    let sotorasib = ranked.iter().find(|r| r.drug_name == "sotorasib").unwrap();
    assert!(sotorasib.overall_score < 0.0);

    let again = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated T790Mp,EGFR mutated L858Rp,KRAS mutated G12Cm",
        &candidates,
        Relation::Efficacy,
        0.5,
    );
    assert_eq!(ranked, again);
}

#[test]
fn test_unrecognized_suffix_equals_omission() {
    let summary = summarize_evidence(&lung_batch(), 0);
    let candidates = drugs(&["erlotinib", "osimertinib", "cetuximab", "sotorasib"]);

    let with_noise = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated L858Rp,KRAS mutated G12Cx",
        &candidates,
        Relation::Efficacy,
        0.5,
    );
    let without = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated L858Rp",
        &candidates,
        Relation::Efficacy,
        0.5,
    );
    assert_eq!(with_noise, without);
    assert_eq!(
        PatientProfile::parse("EGFR mutated L858Rp,KRAS mutated G12Cx"),
        PatientProfile::parse("EGFR mutated L858Rp")
    );
}

#[test]
fn test_no_overlap_produces_no_rows() {
    let summary = summarize_evidence(&lung_batch(), 0);
    let ranked = rank_drugs(
        &summary.hypotheses,
        "ALK fused EML4p,ROS1 fused CD74m",
        &drugs(&["erlotinib", "osimertinib"]),
        Relation::Efficacy,
        0.5,
    );
    assert!(ranked.is_empty());

    let unknown = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated L858Rp",
        &drugs(&["aspirin"]),
        Relation::Efficacy,
        0.5,
    );
    assert!(unknown.is_empty());
}

#[test]
fn test_informative_conditions() {
    let summary = summarize_evidence(&lung_batch(), 0);
    let conditions = summary.hypotheses.informative_conditions(
        &drugs(&["erlotinib"]),
        Relation::Efficacy,
        0.5,
    );
    assert_eq!(
        conditions,
        vec![
            "EGFR mutated L858R".to_string(),
            "EGFR mutated T790M".to_string(),
            "KRAS mutated G12C".to_string(),
        ]
    );
}

#[test]
fn test_ranked_rows_serialize() {
    let summary = summarize_evidence(&lung_batch(), 0);
    let ranked = rank_drugs(
        &summary.hypotheses,
        "EGFR mutated L858Rp",
        &drugs(&["erlotinib"]),
        Relation::Efficacy,
        0.5,
    );
    let json = serde_json::to_value(&ranked).unwrap();
    assert_eq!(json[0]["drug_name"], "erlotinib");
    assert!(json[0]["p_value"].is_number());
}

#[test]
fn test_findings_follow_informative_conditions() {
    let summary = summarize_evidence(&lung_batch(), 0);
    let candidates = drugs(&["erlotinib", "cetuximab"]);
    let findings = summary.hypotheses.informative_findings(&candidates, Relation::Efficacy, 0.5);

    let mut conditions: Vec<String> = findings.iter().map(|f| f.condition.clone()).collect();
    conditions.sort();
    conditions.dedup();
    assert_eq!(
        conditions,
        summary.hypotheses.informative_conditions(&candidates, Relation::Efficacy, 0.5)
    );

    let t790m = findings
        .iter()
        .find(|f| f.drug_name == "erlotinib" && f.condition == "EGFR mutated T790M")
        .unwrap();
    assert_eq!(t790m.sign, Sign::Negative);
    assert_eq!(t790m.label, "resistance");
    assert!(t790m.p_value >= 0.0 && t790m.p_value <= 1.0);
}
