//! Integration tests for cross-guild leaderboard rankings.

use tally::prelude::*;
use tally::testing::TestCoordinator;

const CHANNEL: ChannelId = ChannelId(100);
const ALICE: UserId = UserId(10);
const BOB: UserId = UserId(20);

/// Drive a guild to `target` with alternating authors.
async fn count_to(harness: &TestCoordinator, guild: GuildId, target: i64) {
    for n in 1..=target {
        let author = if n % 2 == 1 { ALICE } else { BOB };
        let outcome = harness
            .coordinator()
            .submit_message(guild, author, &n.to_string(), CHANNEL)
            .await
            .unwrap();
        assert!(
            matches!(outcome, SubmitOutcome::Accepted { .. }),
            "guild {guild} count {n}"
        );
    }
}

#[tokio::test]
async fn guilds_rank_descending_per_metric() {
    let harness = TestCoordinator::new();
    let (g1, g2, g3) = (GuildId::new(1), GuildId::new(2), GuildId::new(3));
    for guild in [g1, g2, g3] {
        harness.configure(guild, CHANNEL).await;
    }

    count_to(&harness, g1, 3).await;
    count_to(&harness, g2, 7).await;
    count_to(&harness, g3, 5).await;

    let ranked = harness
        .coordinator()
        .leaderboard(Metric::CurrentCount)
        .await
        .unwrap();
    let order: Vec<GuildId> = ranked.iter().map(|e| e.guild_id).collect();
    assert_eq!(order, vec![g2, g3, g1]);
    assert_eq!(ranked[0].current_count, 7);
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[2].rank, 3);
}

#[tokio::test]
async fn high_score_ranking_survives_breaks() {
    let harness = TestCoordinator::new();
    let (g1, g2) = (GuildId::new(1), GuildId::new(2));
    harness.configure(g1, CHANNEL).await;
    harness.configure(g2, CHANNEL).await;

    count_to(&harness, g1, 8).await;
    // g1 breaks back to zero; its high score of 8 should still outrank g2's 5.
    harness
        .coordinator()
        .submit_message(g1, ALICE, "999", CHANNEL)
        .await
        .unwrap();
    count_to(&harness, g2, 5).await;

    let by_current = harness
        .coordinator()
        .leaderboard(Metric::CurrentCount)
        .await
        .unwrap();
    assert_eq!(by_current[0].guild_id, g2);

    let by_high = harness
        .coordinator()
        .leaderboard(Metric::HighScore)
        .await
        .unwrap();
    assert_eq!(by_high[0].guild_id, g1);
    assert_eq!(by_high[0].high_score, 8);
}

#[tokio::test]
async fn total_score_sums_over_users_and_follows_resets() {
    let harness = TestCoordinator::new();
    let (g1, g2) = (GuildId::new(1), GuildId::new(2));
    harness.configure(g1, CHANNEL).await;
    harness.configure(g2, CHANNEL).await;

    count_to(&harness, g1, 6).await;
    count_to(&harness, g2, 2).await;

    let by_total = harness
        .coordinator()
        .leaderboard(Metric::TotalScore)
        .await
        .unwrap();
    assert_eq!(by_total[0].guild_id, g1);
    assert_eq!(by_total[0].total_score, 6);

    // An admin reset deletes g1's user rows, so its summed total drops to 0.
    harness.coordinator().reset_count(g1, "season end").await.unwrap();

    let by_total = harness
        .coordinator()
        .leaderboard(Metric::TotalScore)
        .await
        .unwrap();
    assert_eq!(by_total[0].guild_id, g2);
    let g1_entry = by_total.iter().find(|e| e.guild_id == g1).unwrap();
    assert_eq!(g1_entry.total_score, 0);
    // The high score column is untouched by the reset.
    assert_eq!(g1_entry.high_score, 6);
}

#[tokio::test]
async fn ranking_is_deterministic_across_repeated_calls() {
    let harness = TestCoordinator::new();
    // Three guilds, no activity: all tie at zero, so rank order must come
    // from the guild-id tie-break alone.
    for guild in [GuildId::new(30), GuildId::new(10), GuildId::new(20)] {
        harness.configure(guild, CHANNEL).await;
    }

    let first = harness
        .coordinator()
        .leaderboard(Metric::HighScore)
        .await
        .unwrap();
    let second = harness
        .coordinator()
        .leaderboard(Metric::HighScore)
        .await
        .unwrap();
    assert_eq!(first, second);

    let order: Vec<GuildId> = first.iter().map(|e| e.guild_id).collect();
    assert_eq!(
        order,
        vec![GuildId::new(10), GuildId::new(20), GuildId::new(30)]
    );
}

#[tokio::test]
async fn configured_but_inactive_guild_gets_a_valid_rank() {
    let harness = TestCoordinator::new();
    let (active, idle) = (GuildId::new(1), GuildId::new(2));
    harness.configure(active, CHANNEL).await;
    harness.configure(idle, CHANNEL).await;

    count_to(&harness, active, 4).await;

    let ranked = harness
        .coordinator()
        .leaderboard(Metric::CurrentCount)
        .await
        .unwrap();
    let idle_entry = ranked.iter().find(|e| e.guild_id == idle).unwrap();
    assert_eq!(idle_entry.current_count, 0);
    assert_eq!(idle_entry.rank, 2);
}

#[tokio::test]
async fn guild_rank_reports_all_three_metrics() {
    let harness = TestCoordinator::new();
    let (g1, g2) = (GuildId::new(1), GuildId::new(2));
    harness.configure(g1, CHANNEL).await;
    harness.configure(g2, CHANNEL).await;

    count_to(&harness, g1, 9).await;
    // g1 breaks; g2 passes it on current count but not on history.
    harness
        .coordinator()
        .submit_message(g1, ALICE, "999", CHANNEL)
        .await
        .unwrap();
    count_to(&harness, g2, 3).await;

    let ranks = harness.coordinator().guild_rank(g1).await.unwrap();
    assert_eq!(
        ranks,
        GuildRank {
            current_rank: 2,
            high_score_rank: 1,
            total_score_rank: 1,
        }
    );

    // A guild the coordinator has never seen still ranks.
    let unknown = harness
        .coordinator()
        .guild_rank(GuildId::new(999))
        .await
        .unwrap();
    assert_eq!(unknown.current_rank, 3);
}
