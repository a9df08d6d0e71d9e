//! Prompt assembly for the two generation stages.
//!
//! Prompts are Japanese: the service targets ES (entry sheet) material and
//! the deck vocabulary (メッセージライン, 箇条書き) comes from that domain.

use crate::model::{OutlineSlide, Section};

/// Concatenate sections into one title-tagged block.
pub(crate) fn section_block(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| format!("【{}】\n{}", s.title, s.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Stage-1 prompt: segment the material into a story-shaped outline and
/// phrase one message line per slide.
pub(crate) fn outline_prompt(sections: &[Section]) -> String {
    format!(
        r#"以下の自己PR・ES情報から、効果的なプレゼンテーションスライドの構成案を作成してください。

# 入力情報
{}

# メッセージラインの要件
各スライドに1行のメッセージライン（40文字以内）を付けてください：
- このスライドで伝えたい核心メッセージを簡潔に表現
- 事実と示唆を統合した形で記述（「〇〇なので△△が必要」など）
- プレフィックス（「事実:」「示唆:」など）は不要

# 全体要件
1. 最初のスライドはタイトルスライドにする（メッセージラインで全体の目的を明示）
2. 最後にまとめスライドを追加（メッセージラインで結論と次アクション）
3. 全体で5-8枚程度のスライドにする
4. 情報を適切にグループ化し、ストーリー性を持たせる

# 出力形式
以下のJSON形式で返してください：

```json
{{
  "slides": [
    {{
      "title": "スライドのタイトル",
      "message_line": "核心メッセージを1行で表現（プレフィックスなし）"
    }}
  ]
}}
```

JSONのみを返してください（説明文は不要）。"#,
        section_block(sections)
    )
}

/// Stage-2 prompt: ground one slide's body in the original sections.
pub(crate) fn body_prompt(planned: &OutlineSlide, sections: &[Section]) -> String {
    format!(
        r#"以下の入力情報を根拠として、スライドのボディ（箇条書き）を作成してください。

# 入力情報
{}

# 対象スライド
タイトル: {}
メッセージライン: {}

# ボディの要件
メッセージラインを裏付ける箇条書きを3〜5個、次の順序で作成してください：
1. メッセージの根拠となるデータや背景情報
2. 具体的な事例や詳細説明
3. 補足的な分析
4. 行動項目や検討ポイント（必要な場合のみ）

入力情報からの引用・言い換えを優先し、入力にない事実を創作しないでください。
結果はslide_bodyツールで返してください。"#,
        section_block(sections),
        planned.title,
        planned.message_line
    )
}
