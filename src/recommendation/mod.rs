use crate::model::Track;
use crate::query::Resolver;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const SIMILAR_SONGS_PHRASE: &str = "similar songs";

/// Alternate phrasings tried when the first search only finds the seed track again.
const RETRY_QUERY_TEMPLATES: [&str; 5] = [
    "similar to {title}",
    "like {title}",
    "recommendations like {title}",
    "{title} similar tracks",
    "in the style of {title}",
];
const TITLE_PLACEHOLDER: &str = "{title}";

pub(crate) struct Recommender {
    resolver: Arc<dyn Resolver>,
    rng: Mutex<StdRng>,
}

impl Recommender {
    pub(crate) fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_rng(resolver, StdRng::from_entropy())
    }

    pub(crate) fn with_rng(resolver: Arc<dyn Resolver>, rng: StdRng) -> Self {
        Self {
            resolver,
            rng: Mutex::new(rng),
        }
    }

    /// Finds a track similar to `seed`. Every failure is reported as `None`.
    pub(crate) async fn recommend(&self, seed: &Track) -> Option<Track> {
        let recommended = self.search(&initial_query(seed)).await?;
        if recommended.title.to_lowercase() != seed.title.to_lowercase() {
            return Some(recommended);
        }

        debug!("the recommendation for {} found the same track", seed.title);
        let retry_query = self.retry_query(&seed.title);
        self.search(&retry_query).await
    }

    async fn search(&self, query: &str) -> Option<Track> {
        match self.resolver.resolve(query, true).await {
            Ok(track) => Some(track),
            Err(error) => {
                warn!("the recommendation search {query:?} failed: {error}");
                None
            }
        }
    }

    fn retry_query(&self, title: &str) -> String {
        let template = {
            let mut rng = self.rng.lock().unwrap_or_else(|error| error.into_inner());
            RETRY_QUERY_TEMPLATES
                .choose(&mut *rng)
                .copied()
                .unwrap_or(RETRY_QUERY_TEMPLATES[0])
        };
        template.replace(TITLE_PLACEHOLDER, title)
    }
}

fn initial_query(seed: &Track) -> String {
    match &seed.uploader {
        None => format!("{} {SIMILAR_SONGS_PHRASE}", seed.title),
        Some(uploader) => format!("{} {uploader} {SIMILAR_SONGS_PHRASE}", seed.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ResolutionError;
    use crate::testing::{track, ScriptedResolver};

    fn recommender(resolver: &Arc<ScriptedResolver>) -> Recommender {
        Recommender::with_rng(resolver.clone(), StdRng::seed_from_u64(7))
    }

    #[tokio::test]
    async fn first_distinct_result_is_returned() {
        let resolver = Arc::new(ScriptedResolver::new(vec![Ok(track("Other Song"))]));
        let seed = track("Song").with_uploader(Some("Band".to_owned()));

        let recommended = recommender(&resolver).recommend(&seed).await;

        assert_eq!(recommended, Some(track("Other Song")));
        assert_eq!(resolver.queries(), vec!["Song Band similar songs"]);
    }

    #[tokio::test]
    async fn query_without_uploader_omits_it() {
        let resolver = Arc::new(ScriptedResolver::new(vec![Ok(track("Other"))]));

        recommender(&resolver).recommend(&track("Song")).await;

        assert_eq!(resolver.queries(), vec!["Song similar songs"]);
    }

    #[tokio::test]
    async fn collision_retries_once_with_an_alternate_phrasing() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            Ok(track("SONG")),
            Ok(track("Another")),
        ]));

        let recommended = recommender(&resolver).recommend(&track("Song")).await;

        assert_eq!(recommended, Some(track("Another")));
        let queries = resolver.queries();
        assert_eq!(queries.len(), 2);
        let phrasings =
            RETRY_QUERY_TEMPLATES.map(|template| template.replace(TITLE_PLACEHOLDER, "Song"));
        assert!(phrasings.contains(&queries[1]), "{queries:?}");
    }

    #[tokio::test]
    async fn second_collision_is_accepted() {
        let resolver = Arc::new(ScriptedResolver::new(vec![
            Ok(track("song")),
            Ok(track("Song")),
            Ok(track("Never asked")),
        ]));

        let recommended = recommender(&resolver).recommend(&track("Song")).await;

        assert_eq!(recommended, Some(track("Song")));
        assert_eq!(resolver.queries().len(), 2);
    }

    #[tokio::test]
    async fn resolver_errors_become_none() {
        let resolver = Arc::new(ScriptedResolver::new(vec![Err(ResolutionError::Timeout)]));
        assert_eq!(recommender(&resolver).recommend(&track("Song")).await, None);
        assert_eq!(resolver.queries().len(), 1);

        let resolver = Arc::new(ScriptedResolver::new(vec![
            Ok(track("Song")),
            Err(ResolutionError::Backend(anyhow::anyhow!("boom"))),
        ]));
        assert_eq!(recommender(&resolver).recommend(&track("Song")).await, None);
        assert_eq!(resolver.queries().len(), 2);
    }

    #[test]
    fn every_template_mentions_the_title() {
        for template in RETRY_QUERY_TEMPLATES {
            assert!(template.contains(TITLE_PLACEHOLDER));
        }
    }
}
