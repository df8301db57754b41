use maud::{html, Markup};

use crate::{
    db::models::Content,
    models::ContentType,
    names,
    views::components,
};

pub fn content_detail(content: &Content, can_complete: bool, completed: bool) -> Markup {
    html! {
        h1 { (content.title) }
        p {
            small { (content.content_type) " · levels " (content.min_level) "-" (content.max_level) }
        }

        article {
            @if content.content_type == ContentType::Video {
                @if let Some(url) = &content.video_url {
                    p { a href=(url) target="_blank" rel="noopener" { "Watch the video" } }
                }
                @if let Some(file_url) = &content.file_url {
                    video controls src=(file_url) {}
                }
            }
            @if !content.body.is_empty() {
                div.content-body { (content.body) }
            }
            @if let (Some(file_url), Some(file_name)) = (&content.file_url, &content.file_name) {
                p { "Attachment: " a href=(file_url) download=(file_name) { (file_name) } }
            }
        }

        @if let Some(test_id) = content.related_test_id {
            p { a role="button" class="outline" href=(names::take_test_url(test_id)) { "Take the test for this content" } }
        }

        @if can_complete {
            @if completed {
                (components::form_success(Some("You completed this content.")))
            } @else {
                (components::action_button(&names::content_complete_url(content.id), "Mark as completed", ""))
            }
        }
    }
}
