use crate::llm::{LanguageModel, Model};
use crate::prompts::build_follow_up_research_prompt;
use crate::research::events::{EventSink, ResearchEvent};
use crate::research::learning::extract_learning;
use crate::research::queries::{generate_sub_queries, refine_query};
use crate::research::relevance::search_and_evaluate;
use crate::research::report::generate_report;
use crate::research::{Learning, ResearchError, ResearchRequest, ResearchState};
use crate::search::SearchProvider;
use crate::webpage_parse::ContentFetcher;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

const SUB_QUERY_STEP: &str = "generate-sub-queries";

#[derive(Clone)]
pub struct Researcher {
    llm: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn ContentFetcher>,
}

impl Researcher {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
        }
    }

    /// Runs a full research request and streams its progress to `sink`.
    ///
    /// A successful run ends with exactly one `report` event followed by one
    /// `done` event. Any failure, including a run that found nothing, ends
    /// with a single `error` event instead; events already emitted stay
    /// delivered.
    pub async fn start_research(
        &self,
        request: &ResearchRequest,
        sink: &dyn EventSink,
    ) -> Result<ResearchState, ResearchError> {
        tracing::info!(
            query = %request.initial_query,
            depth = request.depth,
            breadth = request.breadth,
            model = request.model.identifier(),
            "starting research"
        );
        match self.run(request, sink).await {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::error!(error = %e, "research failed");
                sink.emit(ResearchEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &ResearchRequest,
        sink: &dyn EventSink,
    ) -> Result<ResearchState, ResearchError> {
        let mut state = ResearchState::new(request.initial_query.clone());
        self.deep_research(
            &request.initial_query,
            request.depth,
            request.breadth,
            request.model,
            &mut state,
            sink,
        )
        .await?;

        if state.learnings().is_empty() {
            return Err(ResearchError::NoLearnings);
        }

        let generated = generate_report(
            self.llm.as_ref(),
            state.learnings(),
            state.initial_query(),
            request.model,
        )
        .await
        .map_err(ResearchError::ReportSynthesis)?;
        state.record_usage(generated.usage);
        sink.emit(ResearchEvent::Report {
            report: generated.report,
            usage: generated.usage,
        });

        let total_usage = state.token_usage();
        tracing::info!(
            learnings = state.learnings().len(),
            queries = state.completed_queries().len(),
            input_tokens = total_usage.input_tokens,
            output_tokens = total_usage.output_tokens,
            "research completed"
        );
        sink.emit(ResearchEvent::Done {
            message: format!(
                "Research completed with {} learnings from {} sources",
                state.learnings().len(),
                state.approved_urls().len()
            ),
            total_usage,
        });
        Ok(state)
    }

    pub fn deep_research<'a>(
        &'a self,
        prompt: &'a str,
        depth: u32,
        breadth: usize,
        model: Model,
        state: &'a mut ResearchState,
        sink: &'a dyn EventSink,
    ) -> BoxFuture<'a, Result<(), ResearchError>> {
        async move {
            if depth == 0 {
                return Ok(());
            }
            tracing::info!(depth, breadth, "research level started");
            sink.emit(ResearchEvent::QueryStart(prompt.to_string()));

            let sub_queries = generate_sub_queries(self.llm.as_ref(), prompt, breadth, model)
                .await
                .map_err(ResearchError::SubQueryGeneration)?;
            state.record_usage(sub_queries.usage);
            if !sub_queries.usage.is_empty() {
                sink.emit(ResearchEvent::StepUsage {
                    step: SUB_QUERY_STEP.to_string(),
                    usage: sub_queries.usage,
                });
            }

            let mut follow_ups: Vec<String> = Vec::new();
            for sub_query in sub_queries.queries {
                if !state.mark_completed(&sub_query) {
                    tracing::debug!(query = %sub_query, "sub-query already researched, skipping");
                    continue;
                }
                if let Some(learning) = self.research_sub_query(&sub_query, model, state, sink).await? {
                    for question in learning.follow_up_questions {
                        if !follow_ups.contains(&question) {
                            follow_ups.push(question);
                        }
                    }
                }
            }

            if depth > 1 && !follow_ups.is_empty() {
                let next_prompt = build_follow_up_research_prompt(
                    state.initial_query(),
                    state.completed_queries(),
                    &follow_ups,
                );
                let next_breadth = breadth.div_ceil(2);
                self.deep_research(&next_prompt, depth - 1, next_breadth, model, state, sink)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    // Refine, search, filter, then accept the first relevant source that
    // yields a document.
    async fn research_sub_query(
        &self,
        sub_query: &str,
        model: Model,
        state: &mut ResearchState,
        sink: &dyn EventSink,
    ) -> Result<Option<Learning>, ResearchError> {
        let refined = refine_query(self.llm.as_ref(), state.initial_query(), sub_query, model)
            .await
            .map_err(ResearchError::Refinement)?;
        state.record_usage(refined.usage);
        sink.emit(ResearchEvent::RefiningQuery {
            query: refined.refined_query.clone(),
            usage: refined.usage,
        });
        let search_query = refined.refined_query;
        if search_query != sub_query && !state.mark_completed(&search_query) {
            tracing::debug!(query = %search_query, "refined query already searched, skipping");
            return Ok(None);
        }

        let existing_urls = state.approved_urls().to_vec();
        let evaluated = search_and_evaluate(
            self.llm.as_ref(),
            self.search.as_ref(),
            &search_query,
            &existing_urls,
            model,
        )
        .await?;
        state.record_usage(evaluated.usage);
        sink.emit(ResearchEvent::RelevanceCheck {
            usage: evaluated.usage,
        });

        for result in evaluated.relevant_results {
            if state.is_approved(&result.url) || !state.mark_attempted(&result.url) {
                continue;
            }
            let Some(document) = self.fetcher.fetch_and_parse_content(&result).await else {
                continue;
            };
            state.approve_url(&result.url);
            let extracted = extract_learning(self.llm.as_ref(), sub_query, &document, model)
                .await
                .map_err(ResearchError::LearningExtraction)?;
            state.record_usage(extracted.usage);
            state.add_learning(extracted.learning.clone());
            tracing::debug!(query = %sub_query, url = %result.url, "learning extracted");
            sink.emit(ResearchEvent::Learning {
                learning: extracted.learning.clone(),
                usage: extracted.usage,
            });
            return Ok(Some(extracted.learning));
        }
        tracing::debug!(query = %sub_query, "no usable source for sub-query");
        Ok(None)
    }
}
