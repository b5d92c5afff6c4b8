// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::editor::{FollowPolicyChoice, ProfileEdit, ProfileEditor};
use crate::feed::{Feed, PublicationController};
use crate::follow::{follow_button_label, follow_price_label, FollowController};
use crate::format::format_age;
use crate::gated::RenderedContent;
use crate::gateway::{
    CollectRules, InMemoryGateway, ProfileSeed, PublicationSeed, SharedGateway, SANDBOX_FOLLOW_MODULE,
};
use crate::metrics;
use crate::models::{
    Amount, ChargeFollowPolicy, Currency, FollowPolicy, Profile, ProfilePage, PublicationId, ReactionType,
};
use crate::notify::{ActionOutcome, Notifier, SuppressReason};
use crate::publish::{PostComposer, PostDraft};
use crate::session::{Capability, SessionContext};

pub const DEMO_VIEWER_ID: &str = "0x01";
pub const DEMO_VIEWER_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
const PAGE_SIZE: usize = 25;

const HELP: &str = "\
Commands:
  profile <handle>             show a profile
  follow <handle>              follow, or unfollow when already following
  unfollow <handle>            unfollow a profile
  followers <handle> [cursor]  list who follows a profile
  following <handle> [cursor]  list who a profile follows
  edit name <text>             change your display name
  edit bio <text>              change your bio
  edit price <amount|free>     charge for follows, or make them free
  show [id]                    show the feed, or one publication
  react <id> <up|down>         toggle a reaction
  mirror <id>                  mirror a publication
  collect <id>                 collect a publication
  post [--followers] <text>    create a post
  comment <id> <text>          comment on a publication
  metrics                      print counters
  quit                         exit";

/// A line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Profile { handle: String },
    Follow { handle: String },
    Unfollow { handle: String },
    Followers { handle: String, cursor: Option<String> },
    Following { handle: String, cursor: Option<String> },
    Edit { edit: ProfileEdit },
    Show { id: Option<PublicationId> },
    React { id: PublicationId, reaction: ReactionType },
    Mirror { id: PublicationId },
    Collect { id: PublicationId },
    Post { text: String, followers_only: bool },
    Comment { parent: PublicationId, text: String },
    Metrics,
    Help,
    Quit,
}

fn handle_arg(arg: Option<&str>, usage: &str) -> Result<String> {
    arg.map(|h| h.trim_start_matches('@').to_string())
        .ok_or_else(|| anyhow!("Usage: {}", usage))
}

fn id_arg(arg: Option<&str>, usage: &str) -> Result<PublicationId> {
    arg.map(str::to_string).ok_or_else(|| anyhow!("Usage: {}", usage))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        let command = match word.to_ascii_lowercase().as_str() {
            "profile" => Command::Profile {
                handle: handle_arg(args.next(), "profile <handle>")?,
            },
            "follow" => Command::Follow {
                handle: handle_arg(args.next(), "follow <handle>")?,
            },
            "unfollow" => Command::Unfollow {
                handle: handle_arg(args.next(), "unfollow <handle>")?,
            },
            "followers" => Command::Followers {
                handle: handle_arg(args.next(), "followers <handle> [cursor]")?,
                cursor: args.next().map(str::to_string),
            },
            "following" => Command::Following {
                handle: handle_arg(args.next(), "following <handle> [cursor]")?,
                cursor: args.next().map(str::to_string),
            },
            "edit" => Command::Edit {
                edit: parse_edit(rest)?,
            },
            "show" => Command::Show {
                id: args.next().map(str::to_string),
            },
            "react" => {
                let id = id_arg(args.next(), "react <id> <up|down>")?;
                let reaction = match args.next() {
                    Some("up") | None => ReactionType::Upvote,
                    Some("down") => ReactionType::Downvote,
                    Some(other) => bail!("Unknown reaction: {}", other),
                };
                Command::React { id, reaction }
            }
            "mirror" => Command::Mirror {
                id: id_arg(args.next(), "mirror <id>")?,
            },
            "collect" => Command::Collect {
                id: id_arg(args.next(), "collect <id>")?,
            },
            "post" => match rest.strip_prefix("--followers") {
                Some(text) => Command::Post {
                    text: text.trim().to_string(),
                    followers_only: true,
                },
                None => Command::Post {
                    text: rest.to_string(),
                    followers_only: false,
                },
            },
            "comment" => {
                let (parent, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("Usage: comment <id> <text>"))?;
                Command::Comment {
                    parent: parent.to_string(),
                    text: text.trim().to_string(),
                }
            }
            "metrics" => Command::Metrics,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("Unknown command: {} (try `help`)", other),
        };
        Ok(command)
    }
}

fn parse_edit(rest: &str) -> Result<ProfileEdit> {
    const USAGE: &str = "Usage: edit <name|bio|price> <value>";
    let (field, value) = rest.split_once(char::is_whitespace).ok_or_else(|| anyhow!(USAGE))?;
    let value = value.trim().to_string();

    let edit = match field {
        "name" => ProfileEdit {
            name: Some(value),
            ..ProfileEdit::default()
        },
        "bio" => ProfileEdit {
            bio: Some(value),
            ..ProfileEdit::default()
        },
        "price" => {
            let choice = if value.eq_ignore_ascii_case("free") {
                FollowPolicyChoice::Open
            } else {
                let price = BigDecimal::from_str(&value).with_context(|| format!("Invalid price: {}", value))?;
                FollowPolicyChoice::Charge(price)
            };
            ProfileEdit {
                follow_policy: Some(choice),
                ..ProfileEdit::default()
            }
        }
        _ => bail!(USAGE),
    };
    Ok(edit)
}

/// What the loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Nothing,
    Quit,
}

/// Session in memory mode falls back to the demo viewer
pub fn sandbox_session(config: &Config) -> SessionContext {
    let mut session = config.session();
    if session.viewer_profile.is_none() {
        session.viewer_profile = Some(DEMO_VIEWER_ID.to_string());
    }
    if session.viewer_address.is_none() {
        session.viewer_address = Some(DEMO_VIEWER_ADDRESS.to_string());
        session.wallet_ready = true;
    }
    session
}

/// Fill the sandbox with a few profiles and publications to play with
pub async fn seed_sandbox(gateway: &InMemoryGateway, config: &Config, viewer: &Capability) -> Vec<PublicationId> {
    let fee = Amount::new(5, config.fee_currency());

    gateway
        .insert_profile(ProfileSeed::open(viewer.profile_id.clone(), "me", viewer.address.clone()).with_name("Me"))
        .await;
    gateway
        .insert_profile(
            ProfileSeed::open("0x02", "stani", "0x2222222222222222222222222222222222222222")
                .with_name("Stani")
                .with_bio("Followers get the alpha.")
                .with_policy(FollowPolicy::Charge(ChargeFollowPolicy {
                    amount: fee.clone(),
                    payee_address: "0x2222222222222222222222222222222222222222".to_string(),
                    contract_address: SANDBOX_FOLLOW_MODULE.to_string(),
                })),
        )
        .await;
    gateway
        .insert_profile(
            ProfileSeed::open("0x03", "aave", "0x3333333333333333333333333333333333333333")
                .with_name("Aave")
                .with_bio("Open to everyone."),
        )
        .await;
    gateway
        .insert_profile(ProfileSeed::open("0x04", "private", "0x5555555555555555555555555555555555555555").closed_to_new_followers())
        .await;

    let now = Utc::now();
    let seeds = vec![
        PublicationSeed::post("0x03", "gm, lending markets are open").created_at(now - Duration::minutes(12)),
        PublicationSeed::post("0x02", "The next release ships on Friday.")
            .followers_only()
            .created_at(now - Duration::hours(3)),
        PublicationSeed::post("0x03", "Limited edition: first ten collectors only")
            .with_collect(CollectRules::open().with_limit(10))
            .created_at(now - Duration::days(2)),
        PublicationSeed::post("0x02", "Please do not mirror this one")
            .without_mirroring()
            .with_collect(CollectRules::open().followers_only())
            .created_at(now - Duration::days(9)),
    ];

    let mut ids = Vec::with_capacity(seeds.len());
    for seed in seeds {
        ids.push(gateway.insert_publication(seed).await);
    }
    info!("Seeded sandbox with {} publications", ids.len());
    ids
}

/// Interactive client wiring every controller to one gateway and session
pub struct App {
    gateway: SharedGateway,
    notifier: Notifier,
    session: SessionContext,
    feed: Feed,
    composer: PostComposer,
    follows: Mutex<HashMap<String, Arc<FollowController>>>,
    ipfs_gateway_url: String,
    fee_currency: Currency,
}

impl App {
    pub fn new(gateway: SharedGateway, notifier: Notifier, session: SessionContext, config: &Config) -> Self {
        let ipfs_gateway_url = config.storage.ipfs_gateway_url.clone();
        Self {
            feed: Feed::new(gateway.clone(), notifier.clone()),
            composer: PostComposer::new(gateway.clone(), notifier.clone(), ipfs_gateway_url.clone()),
            gateway,
            notifier,
            session,
            follows: Mutex::new(HashMap::new()),
            ipfs_gateway_url,
            fee_currency: config.fee_currency(),
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    fn capability(&self) -> Option<Capability> {
        self.session.capability()
    }

    /// Fetch the given publications for the viewer and load them into the feed
    pub async fn load(&self, ids: &[PublicationId]) -> Result<()> {
        let mut publications = Vec::with_capacity(ids.len());
        for id in ids {
            let publication = self
                .gateway
                .get_publication(id, self.session.observer())
                .await
                .with_context(|| format!("Failed to load publication {}", id))?;
            publications.push(publication);
        }
        self.feed.load(publications).await;
        Ok(())
    }

    pub async fn handle(&self, command: Command) -> Result<Reply> {
        debug!("Handling {:?}", command);
        let capability = self.capability();
        let capability = capability.as_ref();

        let reply = match command {
            Command::Profile { handle } => {
                let controller = self.follow_controller(&handle, true).await?;
                Reply::Text(describe_profile(&controller.profile().await))
            }
            Command::Follow { handle } => {
                let controller = self.follow_controller(&handle, false).await?;
                let outcome = controller.click(capability).await;
                self.after_follow_change(&controller, &outcome, capability).await;
                reply_for(outcome)
            }
            Command::Unfollow { handle } => {
                let controller = self.follow_controller(&handle, false).await?;
                let outcome = controller.unfollow(capability).await;
                self.after_follow_change(&controller, &outcome, capability).await;
                reply_for(outcome)
            }
            Command::Followers { handle, cursor } => {
                let profile = self.follow_controller(&handle, true).await?.profile().await;
                let page = self
                    .gateway
                    .list_followers(&profile.id, self.session.observer(), cursor.as_deref(), PAGE_SIZE)
                    .await
                    .with_context(|| format!("Failed to load followers of @{}", handle))?;
                Reply::Text(describe_page(&profile, "followers", &page))
            }
            Command::Following { handle, cursor } => {
                let profile = self.follow_controller(&handle, true).await?.profile().await;
                let page = self
                    .gateway
                    .list_following(&profile.id, self.session.observer(), cursor.as_deref(), PAGE_SIZE)
                    .await
                    .with_context(|| format!("Failed to load profiles followed by @{}", handle))?;
                Reply::Text(describe_page(&profile, "following", &page))
            }
            Command::Edit { edit } => {
                let Some(viewer) = capability else {
                    return Ok(Reply::Text(suppressed_message(SuppressReason::SignedOut).to_string()));
                };
                let profile = self
                    .gateway
                    .get_profile_by_id(&viewer.profile_id, Some(&viewer.profile_id))
                    .await
                    .context("Failed to load your profile")?;
                let editor = ProfileEditor::new(
                    self.gateway.clone(),
                    self.notifier.clone(),
                    profile,
                    self.ipfs_gateway_url.clone(),
                    self.fee_currency.clone(),
                );
                let outcome = editor.save(capability, edit).await;
                editor.close().await;
                reply_for(outcome)
            }
            Command::Show { id: Some(id) } => {
                let entry = self.entry(&id).await?;
                entry.content.evaluate(capability).await;
                Reply::Text(describe_entry(&entry).await)
            }
            Command::Show { id: None } => {
                if self.feed.is_empty().await {
                    return Ok(Reply::Text("Feed is empty".to_string()));
                }
                self.feed.reveal_all(capability).await;

                let mut out = String::new();
                for id in self.feed.ids().await {
                    if let Some(entry) = self.feed.get(&id).await {
                        out.push_str(&describe_entry(&entry).await);
                        out.push('\n');
                    }
                }
                Reply::Text(out.trim_end().to_string())
            }
            Command::React { id, reaction } => {
                let entry = self.entry(&id).await?;
                reply_for(entry.interactions.toggle_reaction(capability, reaction).await)
            }
            Command::Mirror { id } => {
                let entry = self.entry(&id).await?;
                reply_for(entry.interactions.mirror(capability).await)
            }
            Command::Collect { id } => {
                let entry = self.entry(&id).await?;
                reply_for(entry.interactions.collect(capability).await)
            }
            Command::Post { text, followers_only } => {
                let draft = PostDraft {
                    content: text,
                    media: None,
                    followers_only,
                };
                reply_for(self.composer.create_post(capability, draft, &self.feed).await)
            }
            Command::Comment { parent, text } => {
                reply_for(
                    self.composer
                        .create_comment(capability, &parent, &text, &self.feed)
                        .await,
                )
            }
            Command::Metrics => Reply::Text(metrics::gather_text()?),
            Command::Help => Reply::Text(HELP.to_string()),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    /// Refetch the feed entries of a profile the viewer just followed or unfollowed
    async fn after_follow_change(
        &self,
        controller: &FollowController,
        outcome: &ActionOutcome,
        capability: Option<&Capability>,
    ) {
        if !outcome.is_confirmed() {
            return;
        }
        let author = controller.profile().await.id;
        if let Err(e) = self.feed.refresh_author(&author, capability).await {
            warn!("Failed to refresh publications of {}: {}", author, e);
        }
    }

    /// Controller for `handle`, fetched on first use or when `reload` is set
    async fn follow_controller(&self, handle: &str, reload: bool) -> Result<Arc<FollowController>> {
        let mut follows = self.follows.lock().await;
        if !reload {
            if let Some(controller) = follows.get(handle) {
                return Ok(controller.clone());
            }
        }

        let profile = self
            .gateway
            .get_profile(handle, self.session.observer())
            .await
            .with_context(|| format!("Failed to load profile @{}", handle))?;
        let controller = Arc::new(FollowController::new(
            self.gateway.clone(),
            self.notifier.clone(),
            profile,
        ));
        if let Some(previous) = follows.insert(handle.to_string(), controller.clone()) {
            previous.close().await;
        }
        Ok(controller)
    }

    /// Feed entry for `id`, fetching and appending it when unknown
    async fn entry(&self, id: &PublicationId) -> Result<Arc<PublicationController>> {
        if let Some(entry) = self.feed.get(id).await {
            return Ok(entry);
        }
        let publication = self
            .gateway
            .get_publication(id, self.session.observer())
            .await
            .with_context(|| format!("Failed to load publication {}", id))?;
        Ok(self.feed.append(publication).await)
    }
}

fn reply_for(outcome: ActionOutcome) -> Reply {
    match outcome {
        ActionOutcome::Suppressed(reason) => Reply::Text(suppressed_message(reason).to_string()),
        // Notifications are printed by the receiver
        _ => Reply::Nothing,
    }
}

fn suppressed_message(reason: SuppressReason) -> &'static str {
    match reason {
        SuppressReason::SignedOut => "Sign in with a connected wallet first",
        SuppressReason::InFlight => "Still working on the previous request",
        SuppressReason::OwnProfile => "This is your profile",
        SuppressReason::AlreadyMirrored => "Already mirrored",
        SuppressReason::AlreadyCollected => "Already collected",
        SuppressReason::EmptyDraft => "Nothing to publish",
        SuppressReason::NoChanges => "Nothing to update",
        SuppressReason::NotOwner => "You can only edit your own profile",
        SuppressReason::Closed => "This view is closed",
    }
}

fn describe_profile(profile: &Profile) -> String {
    let mut out = format!("{} (@{})", profile.display_name(), profile.handle);
    if let Some(bio) = &profile.bio {
        let _ = write!(out, "\n{}", bio);
    }
    let _ = write!(
        out,
        "\n{} followers | {} following | {} posts\n[{}]",
        profile.stats.followers,
        profile.stats.following,
        profile.stats.posts,
        follow_button_label(profile)
    );
    if let Some(price) = follow_price_label(profile) {
        let _ = write!(out, " {}", price);
    }
    out
}

fn describe_page(profile: &Profile, list: &str, page: &ProfilePage) -> String {
    let mut out = format!("{}'s {}\n@{}", profile.display_name(), list, profile.handle);
    if page.profiles.is_empty() {
        out.push_str("\n  nobody yet");
    }
    for entry in &page.profiles {
        let _ = write!(out, "\n  {} (@{})", entry.display_name(), entry.handle);
    }
    if let Some(cursor) = &page.next_cursor {
        let _ = write!(out, "\n(more: {} {} {})", list, profile.handle, cursor);
    }
    out
}

async fn describe_entry(entry: &PublicationController) -> String {
    let publication = entry.interactions.publication().await;
    let view = entry.interactions.view().await;

    let body = match entry.content.render().await {
        RenderedContent::Text(text) => text,
        RenderedContent::Sealed => "[encrypted]".to_string(),
        RenderedContent::FollowToUnlock { author_handle } => {
            format!("[follow @{} to unlock this post]", author_handle)
        }
        RenderedContent::Unavailable => "[no content]".to_string(),
    };

    let mut flags = Vec::new();
    if view.upvoted {
        flags.push("upvoted");
    }
    if view.downvoted {
        flags.push("downvoted");
    }
    if view.mirrored {
        flags.push("mirrored");
    }
    if view.collected {
        flags.push("collected");
    }

    let mut out = format!(
        "{} @{} {}\n  {}\n  {} upvotes | {} comments | {} mirrors | {} collects",
        publication.id,
        publication.author.handle,
        format_age(publication.created_at, Utc::now()),
        body,
        view.stats.upvotes,
        view.stats.comments,
        view.stats.mirrors,
        view.stats.collects,
    );
    if !flags.is_empty() {
        let _ = write!(out, " ({})", flags.join(", "));
    }
    out
}
